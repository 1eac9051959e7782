use anyhow::Context;
use streaming_png::PNG;

fn main() -> anyhow::Result<()> {
    let args: Vec<_> = std::env::args().skip(1).collect();
    let verbosity = if args.first().map(String::as_str) == Some("-v") {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Error
    };
    pretty_env_logger::formatted_builder()
        .filter_level(verbosity)
        .init();
    let file_name = args
        .last()
        .filter(|arg| *arg != "-v")
        .context("usage: process-image [-v] <path>")?;
    let input = std::fs::read(file_name).with_context(|| format!("Failed to read {file_name}"))?;
    let png = PNG::decode(&input).with_context(|| format!("Failed to decode {file_name}"))?;
    log::info!(
        "{}x{} image, {} text entries",
        png.image().width(),
        png.image().height(),
        png.image().metadata().text()?.len()
    );
    std::fs::write("output.png", png.encode()?).context("Failed to write output.png")?;
    Ok(())
}
