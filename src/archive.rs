use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io::{self, BufReader};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
pub enum ArchiveFormat {
    #[default]
    #[serde(rename = "zip")]
    #[value(name = "zip")]
    Zip,
    #[serde(rename = "tar.zst")]
    #[value(name = "tar.zst")]
    TarZst,
    #[serde(rename = "tar.gz")]
    #[value(name = "tar.gz")]
    TarGz,
}

impl ArchiveFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarZst => "tar.zst",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }

    /// Clamps `level` into the range the codec accepts.
    pub fn clamp_level(self, level: i32) -> i32 {
        match self {
            ArchiveFormat::Zip | ArchiveFormat::TarGz => level.clamp(0, 9),
            ArchiveFormat::TarZst => level.clamp(1, 22),
        }
    }
}

/// Writes an archive at `dest` holding `source` as its only entry, stored
/// under the source's file name.
pub fn write_single_entry(source: &Path, dest: &Path, format: ArchiveFormat, level: i32) -> Result<()> {
    let entry_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .context("Invalid artifact file name")?;
    let level = format.clamp_level(level);

    let file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .with_context(|| format!("Failed to create archive: {}", dest.display()))?;

    match format {
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .compression_level(Some(i64::from(level)))
                .large_file(fs::metadata(source)?.len() >= u64::from(u32::MAX));
            zip.start_file(entry_name, options)
                .context("Failed to start zip entry")?;

            let mut reader = BufReader::new(
                fs::File::open(source)
                    .with_context(|| format!("Failed to open: {}", source.display()))?,
            );
            io::copy(&mut reader, &mut zip).context("Failed to write zip entry")?;
            zip.finish().context("Failed to finish zip archive")?;
        }
        ArchiveFormat::TarZst => {
            let encoder = zstd::Encoder::new(file, level)?;
            let mut tar = tar::Builder::new(encoder);
            tar.append_path_with_name(source, entry_name)
                .with_context(|| format!("Failed to add file to archive: {}", source.display()))?;
            tar.into_inner()
                .context("Failed to finish tar archive")?
                .finish()
                .context("Failed to finish zstd stream")?;
        }
        ArchiveFormat::TarGz => {
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::new(level as u32));
            let mut tar = tar::Builder::new(encoder);
            tar.append_path_with_name(source, entry_name)
                .with_context(|| format!("Failed to add file to archive: {}", source.display()))?;
            tar.into_inner()
                .context("Failed to finish tar archive")?
                .finish()
                .context("Failed to finish gzip stream")?;
        }
    }

    Ok(())
}
