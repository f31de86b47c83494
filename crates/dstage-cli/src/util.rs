use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use dstage_classifiers::explain::Attribution;

/// `\t` for `.tsv` paths, `,` for everything else.
pub fn delimiter_for(path: &Path) -> u8 {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());
    match extension.as_deref() {
        Some("tsv") => b'\t',
        _ => b',',
    }
}

pub fn write_bytes_to_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    Ok(())
}

/// Write one row per feature, ordered by decreasing absolute contribution.
pub fn write_attribution_table<P: AsRef<Path>>(attribution: &Attribution, output_path: P) -> Result<()> {
    let path = output_path.as_ref();
    let file = File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter_for(path))
        .from_writer(BufWriter::new(file));

    writer.write_record(["feature", "value", "shap_value", "base_value", "output_index"])?;
    for i in attribution.order_by_magnitude() {
        writer.write_record(&[
            attribution.feature_names[i].clone(),
            attribution.feature_values[i].to_string(),
            format!("{:.6}", attribution.values[i]),
            format!("{:.6}", attribution.base_value),
            attribution.output_index.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
