use std::path::Path;

use console::Style;
use zogy_core::pipeline::config::SubtractionConfig;
use zogy_core::pipeline::{EstimateSource, FrameInputs, SubtractionOutput};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn on_off(s: &Styles, enabled: bool) -> String {
    if enabled {
        s.method.apply_to("local, global fallback").to_string()
    } else {
        s.disabled.apply_to("global only").to_string()
    }
}

pub fn print_subtraction_summary(
    config: &SubtractionConfig,
    new: &Path,
    reference: &Path,
    new_inputs: &FrameInputs,
) {
    let s = Styles::new();
    let (h, w) = new_inputs.frame.dim();

    println!();
    println!("  {}", s.title.apply_to("ZOGY Subtraction"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(16)));
    println!();

    println!("  {:<14}{}", s.label.apply_to("New"), s.path.apply_to(new.display()));
    println!(
        "  {:<14}{}",
        s.label.apply_to("Reference"),
        s.path.apply_to(reference.display())
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Frame"),
        s.value.apply_to(format!("{w}x{h}"))
    );
    println!();

    let meta = &new_inputs.frame.metadata;
    println!("  {}", s.header.apply_to("Detector"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Gain"),
        s.value.apply_to(format!("{:.3} e-/ADU", meta.gain))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Read noise"),
        s.value.apply_to(format!("{:.2} e-", meta.read_noise))
    );
    let saturation = if meta.saturation.is_finite() {
        s.value.apply_to(format!("{:.0} ADU", meta.saturation)).to_string()
    } else {
        s.disabled.apply_to("not set").to_string()
    };
    println!("    {:<12}{}", s.label.apply_to("Saturation"), saturation);
    println!();

    println!("  {}", s.header.apply_to("Tiling"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Tile"),
        s.value.apply_to(format!("{} px", config.tile_size))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Border"),
        s.value.apply_to(format!("{} px", config.tile_border))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Background"),
        s.method.apply_to(config.background)
    );
    println!();

    println!("  {}", s.header.apply_to("Estimates"));
    println!("    {:<12}{}", s.label.apply_to("Flux ratio"), on_off(&s, config.flux_ratio_local));
    println!("    {:<12}{}", s.label.apply_to("Offsets"), on_off(&s, config.offset_local));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Matching"),
        s.value.apply_to(format!(
            "{} < {}\"",
            config.matching.policy, config.matching.radius_arcsec
        ))
    );
    println!();
}

pub fn print_result_summary(output: &SubtractionOutput, output_dir: &Path) {
    let s = Styles::new();
    let local = output
        .tiles
        .iter()
        .filter(|t| t.estimates.flux_source == EstimateSource::Local)
        .count();

    println!();
    println!("  {}", s.header.apply_to("Result"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Matches"),
        s.value.apply_to(format!(
            "{} ({:.0}%)",
            output.global.count,
            output.match_fraction * 100.0
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Flux ratio"),
        s.value.apply_to(format!(
            "{:.4} \u{00b1} {:.4}",
            output.global.flux_ratio, output.global.flux_ratio_std
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Offsets"),
        s.value.apply_to(format!(
            "dx {:.3} px, dy {:.3} px",
            output.global.dx, output.global.dy
        ))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Local tiles"),
        s.value.apply_to(format!("{local}/{}", output.tiles.len()))
    );
    println!();
    println!(
        "  Output saved to {}",
        s.path.apply_to(output_dir.display())
    );
}
