use anyhow::{bail, Context, Result};
use quote_harvester::ArchiveDownloader;
use std::fs;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        bail!("usage: fetch_archive <year> <month> <day> [out_dir]");
    }
    let year: i32 = args[1].parse().context("bad year")?;
    let month: u32 = args[2].parse().context("bad month")?;
    let day: u32 = args[3].parse().context("bad day")?;
    let out_dir = args.get(4).map(String::as_str).unwrap_or("archives");

    let downloader = ArchiveDownloader::new()?;
    let entries = downloader.download_day_archive(year, month, day).await?;
    if entries.is_empty() {
        println!("No trade archive for {:04}-{:02}-{:02}", year, month, day);
        return Ok(());
    }

    fs::create_dir_all(out_dir)?;
    for (name, bytes) in &entries {
        let path = Path::new(out_dir).join(name);
        fs::write(&path, bytes)?;
        println!("{} ({} bytes)", path.display(), bytes.len());
    }

    Ok(())
}
