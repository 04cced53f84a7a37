use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::preprocess::{decode, downscale, map_back};
use super::setup::{ensure_traineddata, find_tesseract_executable};
use super::{DetectedItem, OcrError, OcrProvider, ScanMode, ScanOutput};
use crate::automation::config::LocalOcrConfig;

/// A line of OCR text with its bounding box and mean confidence (0-100).
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f32,
}

/// Local provider running the Tesseract CLI with TSV output.
pub struct TesseractOcr {
    executable: PathBuf,
    tessdata: PathBuf,
    language: String,
    psm: u8,
}

impl TesseractOcr {
    pub fn new(config: &LocalOcrConfig) -> Result<Self, OcrError> {
        let executable = find_tesseract_executable(config.tesseract_path.as_deref())?;
        let tessdata = ensure_traineddata(config.tessdata_dir.as_deref(), &config.language)?;
        tracing::info!(
            "Tesseract: {} (lang={}, psm={})",
            executable.display(),
            config.language,
            config.psm
        );
        Ok(Self {
            executable,
            tessdata,
            language: config.language.clone(),
            psm: config.psm,
        })
    }

    /// Runs Tesseract on an image file and returns its TSV output.
    fn run_tsv(&self, input: &std::path::Path) -> Result<String, OcrError> {
        // Tesseract appends .tsv to the output base
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let output = Command::new(&self.executable)
            .arg(input)
            .arg(&output_base)
            .arg("--tessdata-dir")
            .arg(&self.tessdata)
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.psm.to_string())
            .arg("tsv")
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(stderr.trim().to_string()));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv = std::fs::read_to_string(&tsv_path)?;
        let _ = std::fs::remove_file(&tsv_path);
        Ok(tsv)
    }
}

impl OcrProvider for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn scan(&self, image: &[u8], mode: ScanMode, factor: f32) -> Result<ScanOutput, OcrError> {
        let img = decode(image)?;
        let (img, applied) = downscale(img, factor);

        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())?;
        let lines = parse_tsv_output(&self.run_tsv(temp_input.path())?);

        Ok(match mode {
            ScanMode::Text => ScanOutput::Text(lines.into_iter().map(|l| l.text).collect()),
            ScanMode::Detailed => ScanOutput::Detailed(
                lines
                    .into_iter()
                    .map(|l| {
                        let item = DetectedItem::from_box(
                            l.left,
                            l.top,
                            l.width,
                            l.height,
                            l.text,
                            (l.confidence / 100.0).clamp(0.0, 1.0),
                        );
                        DetectedItem {
                            region: map_back(item.region, applied),
                            ..item
                        }
                    })
                    .collect(),
            ),
        })
    }
}

#[derive(Default)]
struct LineAccumulator {
    words: Vec<String>,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    conf_sum: f32,
}

impl LineAccumulator {
    fn push(&mut self, text: &str, left: i32, top: i32, width: i32, height: i32, conf: f32) {
        if self.words.is_empty() {
            (self.left, self.top) = (left, top);
            (self.right, self.bottom) = (left + width, top + height);
        } else {
            self.left = self.left.min(left);
            self.top = self.top.min(top);
            self.right = self.right.max(left + width);
            self.bottom = self.bottom.max(top + height);
        }
        self.words.push(text.to_string());
        self.conf_sum += conf;
    }

    fn finish(self) -> OcrLine {
        OcrLine {
            confidence: self.conf_sum / self.words.len().max(1) as f32,
            // chi_sim splits every glyph into its own word
            text: self.words.concat(),
            left: self.left,
            top: self.top,
            width: self.right - self.left,
            height: self.bottom - self.top,
        }
    }
}

/// Parses Tesseract TSV output into lines, top to bottom.
///
/// Words are grouped by (block, paragraph, line); each line gets the union of
/// its word boxes and the mean word confidence.
pub fn parse_tsv_output(tsv: &str) -> Vec<OcrLine> {
    let mut lines: BTreeMap<(i32, i32, i32), LineAccumulator> = BTreeMap::new();

    for row in tsv.lines().skip(1) {
        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }
        let num = |i: usize| fields[i].trim().parse::<i32>().unwrap_or(-1);

        // Level 5 = word
        if num(0) != 5 {
            continue;
        }
        let text = fields[11].trim();
        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }

        lines
            .entry((num(2), num(3), num(4)))
            .or_default()
            .push(text, num(6), num(7), num(8), num(9), conf);
    }

    let mut result: Vec<OcrLine> = lines.into_values().map(LineAccumulator::finish).collect();
    result.sort_by_key(|l| (l.top, l.left));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn tsv(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn test_parse_groups_words_into_lines() {
        let input = tsv(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t460\t850\t-1\t",
            "4\t1\t1\t1\t1\t0\t20\t30\t90\t24\t-1\t",
            "5\t1\t1\t1\t1\t1\t20\t30\t30\t24\t96\t胡",
            "5\t1\t1\t1\t1\t2\t50\t31\t30\t23\t90\t萝",
            "5\t1\t1\t1\t1\t3\t80\t30\t30\t24\t93\t卜",
            "5\t1\t1\t1\t2\t1\t20\t120\t30\t24\t88\t6",
        ]);
        let lines = parse_tsv_output(&input);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "胡萝卜");
        assert_eq!((lines[0].left, lines[0].top), (20, 30));
        assert_eq!((lines[0].width, lines[0].height), (90, 24));
        assert!((lines[0].confidence - 93.0).abs() < 1e-4);
        assert_eq!(lines[1].text, "6");
    }

    #[test]
    fn test_parse_skips_empty_and_unscored_words() {
        let input = tsv(&[
            "5\t1\t1\t1\t1\t1\t0\t0\t10\t10\t-1\tx",
            "5\t1\t1\t1\t1\t2\t0\t0\t10\t10\t80\t ",
            "bad row",
        ]);
        assert!(parse_tsv_output(&input).is_empty());
    }

    #[test]
    fn test_parse_orders_lines_top_to_bottom() {
        let input = tsv(&[
            "5\t1\t2\t1\t1\t1\t0\t300\t10\t10\t90\t乙",
            "5\t1\t1\t1\t1\t1\t0\t100\t10\t10\t90\t甲",
        ]);
        let texts: Vec<String> = parse_tsv_output(&input).into_iter().map(|l| l.text).collect();
        assert_eq!(texts, vec!["甲", "乙"]);
    }
}
