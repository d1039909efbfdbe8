// Rendering of the tally documents with the poppler command line tools.

use std::fs::File;
use std::io::Read;
use std::process::Command;

use snafu::prelude::*;

use crate::audit::{io_common::simplify_file_name, *};

/// The first bytes of every PDF document.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// True if the file starts with the PDF signature.
///
/// Unreadable files are not PDF documents.
pub fn is_pdf(path: &Path) -> bool {
    let mut header = [0u8; 5];
    match File::open(path).and_then(|mut f| f.read_exact(&mut header)) {
        Ok(()) => header == PDF_SIGNATURE,
        Err(e) => {
            debug!("is_pdf: cannot read {}: {}", path.display(), e);
            false
        }
    }
}

/// The PDF documents among the inputs, in input order. Other files are skipped.
pub fn collect_documents(inputs: &[String], dpi: u32) -> Vec<PdfDocument> {
    inputs
        .iter()
        .map(PathBuf::from)
        .filter(|p| {
            let keep = is_pdf(p);
            if !keep {
                debug!("collect_documents: skipping {}: not a PDF document", p.display());
            }
            keep
        })
        .map(|p| PdfDocument::new(p, dpi))
        .collect()
}

fn parse_page_count(pdfinfo_output: &str) -> Option<u32> {
    pdfinfo_output
        .lines()
        .find_map(|l| l.strip_prefix("Pages:"))
        .and_then(|s| s.trim().parse::<u32>().ok())
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PdfDocument {
    path: PathBuf,
    dpi: u32,
}

impl PdfDocument {
    pub fn new(path: PathBuf, dpi: u32) -> PdfDocument {
        PdfDocument { path, dpi }
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }
}

impl Document for PdfDocument {
    type Error = AuditError;

    fn name(&self) -> String {
        simplify_file_name(&self.path)
    }

    fn page_count(&self) -> AuditResult<u32> {
        let output = Command::new("pdfinfo")
            .arg(&self.path)
            .output()
            .context(RenderCommandSnafu { command: "pdfinfo" })?;
        if !output.status.success() {
            return RenderFailedSnafu {
                command: "pdfinfo",
                page: 0u32,
                path: self.path_str(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }
            .fail();
        }
        parse_page_count(&String::from_utf8_lossy(&output.stdout)).context(PageCountSnafu {
            path: self.path_str(),
        })
    }

    fn render_page(&self, page_number: u32) -> AuditResult<Vec<u8>> {
        let temp_dir = tempfile::tempdir().context(RenderCommandSnafu {
            command: "tempdir",
        })?;
        let output_prefix = temp_dir.path().join("page");
        let page = page_number.to_string();
        let dpi = self.dpi.to_string();

        let output = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi, "-f", &page, "-l", &page, "-singlefile"])
            .arg(&self.path)
            .arg(&output_prefix)
            .output()
            .context(RenderCommandSnafu {
                command: "pdftoppm",
            })?;
        if !output.status.success() {
            return RenderFailedSnafu {
                command: "pdftoppm",
                page: page_number,
                path: self.path_str(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }
            .fail();
        }

        // With -singlefile, pdftoppm writes exactly <prefix>.png
        let png_path = output_prefix.with_extension("png");
        fs::read(&png_path).context(ReadingImageSnafu {
            page: page_number,
            path: self.path_str(),
        })
    }
}
