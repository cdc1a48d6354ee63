use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use stackpaint::assets::ExportFormat;

#[derive(Parser, Debug)]
#[command(name = "stackpaint", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose a JSON scene and write the flattened image.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input scene JSON.
    scene: PathBuf,

    /// Output image path.
    #[arg(short, long)]
    out: PathBuf,

    /// Output format. Defaults to the scene's export setting, then the config.
    #[arg(long, value_enum)]
    format: Option<FormatChoice>,

    /// JPEG quality, 1-100.
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Png,
    Jpeg,
    Webp,
}

impl FormatChoice {
    const fn export(self, quality: u8) -> ExportFormat {
        match self {
            Self::Png => ExportFormat::Png,
            Self::Jpeg => ExportFormat::Jpeg { quality },
            Self::Webp => ExportFormat::Webp,
        }
    }
}

fn main() -> anyhow::Result<()> {
    stackpaint::logging::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let format = args.format.map(|choice| choice.export(args.quality));
    stackpaint::render_scene(&args.scene, &args.out, format)
        .with_context(|| format!("render scene '{}'", args.scene.display()))
}
