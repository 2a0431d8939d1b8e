//! Packing of per-scene intermediates.

use anyhow::{Context, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// Packs `files` into a deflate-compressed archive at `output` and deletes
/// the originals afterwards. Entries are stored flat under their file names.
pub fn zip_files(files: &[PathBuf], output: &Path) -> Result<()> {
	let archive = File::create(output).with_context(|| format!("cannot create {output:?}"))?;
	let mut writer = zip::ZipWriter::new(archive);
	let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

	for path in files {
		let name = path
			.file_name()
			.and_then(|name| name.to_str())
			.with_context(|| format!("{path:?} has no usable file name"))?;
		writer
			.start_file(name, options.clone())
			.with_context(|| format!("cannot add {name} to {output:?}"))?;
		let mut source = File::open(path).with_context(|| format!("cannot open {path:?}"))?;
		io::copy(&mut source, &mut writer).with_context(|| format!("cannot pack {path:?}"))?;
	}
	writer.finish().with_context(|| format!("cannot finalize {output:?}"))?;

	for path in files {
		std::fs::remove_file(path).with_context(|| format!("cannot remove packed file {path:?}"))?;
	}
	log::debug!("packed {} files into {output:?}", files.len());
	Ok(())
}
