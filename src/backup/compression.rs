use crate::error::Result;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

enum Entry {
    Dir(String),
    File(PathBuf, String),
}

/// Sorted archive entries for `source_dir`: its files, and each direct
/// subdirectory followed by that subdirectory's files. Deeper levels are not
/// descended into.
fn collect_entries(source_dir: &Path) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();

    for (path, name) in sorted_children(source_dir)? {
        if path.is_dir() {
            entries.push(Entry::Dir(format!("{}/", name)));
            for (child, child_name) in sorted_children(&path)? {
                if child.is_file() {
                    entries.push(Entry::File(child, format!("{}/{}", name, child_name)));
                }
            }
        } else if path.is_file() {
            entries.push(Entry::File(path, name));
        }
    }

    Ok(entries)
}

fn sorted_children(dir: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        children.push((entry.path(), entry.file_name().to_string_lossy().to_string()));
    }
    children.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(children)
}

/// Zips the contents of `source_dir` (not the directory itself) into
/// `dest_path` and returns the size of the written archive.
pub fn compress_directory(source_dir: &Path, dest_path: &Path) -> Result<u64> {
    let entries = collect_entries(source_dir)?;

    let dest_file = File::create(dest_path)?;
    let buffered_writer = BufWriter::new(dest_file);
    let mut zip = ZipWriter::new(buffered_writer);

    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(6));

    let mut buffer = vec![0u8; 64 * 1024];

    for entry in &entries {
        match entry {
            Entry::Dir(name) => {
                debug!("Adding directory {}", name);
                zip.add_directory(name.as_str(), options)?;
            }
            Entry::File(source_path, name) => {
                debug!("Adding {} as {}", source_path.display(), name);
                zip.start_file(name.as_str(), options)?;

                let source_file = File::open(source_path)?;
                let mut reader = BufReader::new(source_file);

                loop {
                    let bytes_read = reader.read(&mut buffer)?;
                    if bytes_read == 0 {
                        break;
                    }
                    zip.write_all(&buffer[..bytes_read])?;
                }
            }
        }
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    drop(writer);

    let dest_size = fs::metadata(dest_path)?.len();
    debug!("Compression complete: {} entries, {} bytes", entries.len(), dest_size);

    Ok(dest_size)
}

pub fn calculate_sha256(file_path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};

    let file = File::open(file_path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let hash = hasher.finalize();
    Ok(format!("{:x}", hash))
}
