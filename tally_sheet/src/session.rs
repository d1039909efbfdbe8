use crate::config::*;

use log::{debug, info, warn};
use std::fmt::Display;
use std::ops::RangeInclusive;

/// A document whose pages can be rendered to images.
pub trait Document {
    type Error: Display;

    /// A short name, used for logging.
    fn name(&self) -> String;

    fn page_count(&self) -> Result<u32, Self::Error>;

    /// Renders the given 1-based page as PNG bytes.
    fn render_page(&self, page_number: u32) -> Result<Vec<u8>, Self::Error>;
}

/// Turns the image of a page into a record.
///
/// The returned record does not need a page number: it is set by the session.
pub trait PageExtractor {
    type Error: Display;

    fn extract(&self, image: &[u8]) -> Result<PageRecord, Self::Error>;
}

/// The state of one extraction run.
///
/// The results are only appended to during a run, in page order.
///
/// ```
/// use tally_sheet::ExtractionSession;
///
/// let session = ExtractionSession::new();
/// assert!(session.results().is_empty());
/// assert_eq!(session.progress(), 0);
/// ```
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ExtractionSession {
    results: Vec<PageRecord>,
    progress: u8,
    processing: bool,
    error: Option<String>,
    first_page: Option<u32>,
    last_page: Option<u32>,
}

impl ExtractionSession {
    pub fn new() -> ExtractionSession {
        ExtractionSession::default()
    }

    /// Only processes the pages `first..=last` (1-based) of each document.
    ///
    /// By default, processing starts at the first page and ends at the last
    /// page of the document. Pages keep their absolute number.
    pub fn page_window(self, first: Option<u32>, last: Option<u32>) -> ExtractionSession {
        ExtractionSession {
            first_page: first,
            last_page: last,
            ..self
        }
    }

    /// The pages of a document of `page_count` pages that are processed.
    fn pages(&self, page_count: u32) -> RangeInclusive<u32> {
        let first = self.first_page.unwrap_or(1).max(1);
        let last = self
            .last_page
            .map_or(page_count, |l| l.min(page_count));
        first..=last
    }

    pub fn results(&self) -> &[PageRecord] {
        self.results.as_slice()
    }

    pub fn into_results(self) -> Vec<PageRecord> {
        self.results
    }

    /// Progress of the current run, in percent.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// The error that stopped the last run, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn reset(&mut self) {
        self.results.clear();
        self.progress = 0;
        self.error = None;
    }

    fn update_progress(&mut self, start_index: usize, page_index: u32, page_count: u32, total_files: usize) {
        let file_fraction = if page_count > 0 {
            (page_index as f64) / (page_count as f64)
        } else {
            1.0
        };
        let p = ((start_index as f64 + file_fraction) / (total_files.max(1) as f64) * 100.0).round();
        // Never goes backwards within a run.
        self.progress = self.progress.max(p.clamp(0.0, 100.0) as u8);
        info!("Progress: {}%", self.progress);
    }
}

/// Processes all the pages of one document, in order.
///
/// Every page is rendered, extracted and classified. A page that fails
/// extraction is skipped and processing continues with the next page. A
/// rendering failure stops the processing of the document and is returned.
///
/// Arguments:
/// * `start_index` the 0-based position of this document in the run
/// * `total_files` the number of documents in the run
pub fn process_file<D: Document, E: PageExtractor>(
    session: &mut ExtractionSession,
    document: &D,
    start_index: usize,
    total_files: usize,
    extractor: &E,
    table: &ClassificationTable,
) -> Result<(), D::Error> {
    let page_count = document.page_count()?;
    let pages = session.pages(page_count);
    let selected = pages.clone().count() as u32;
    info!(
        "process_file: {} ({} of {}): {} pages, processing {} from page {}",
        document.name(),
        start_index + 1,
        total_files,
        page_count,
        selected,
        pages.start()
    );
    if selected == 0 {
        session.update_progress(start_index, 0, 0, total_files);
    }
    for (idx, page_number) in pages.enumerate() {
        let image = document.render_page(page_number)?;
        debug!(
            "process_file: {} page {}: rendered {} bytes",
            document.name(),
            page_number,
            image.len()
        );
        match extractor.extract(&image) {
            Ok(rec) => {
                let voting_type = table.classify(page_number, &rec.voting_type);
                debug!(
                    "process_file: page {}: district {:?}, voting type {:?} -> {:?}",
                    page_number, rec.district, rec.voting_type, voting_type
                );
                session.results.push(PageRecord {
                    page_number: Some(page_number),
                    voting_type,
                    ..rec
                });
            }
            Err(e) => {
                warn!(
                    "process_file: {} page {}: extraction failed, skipping page: {}",
                    document.name(),
                    page_number,
                    e
                );
            }
        }
        session.update_progress(start_index, idx as u32 + 1, selected, total_files);
    }
    Ok(())
}

/// Runs the extraction over all the documents, one after the other.
///
/// The session is reset first. A failure that stops the run is recorded as
/// the error of the session and returned; the records collected until then
/// are kept. At the end of the run, the progress is always 100 and the
/// session is not processing anymore.
pub fn start_extraction<D: Document, E: PageExtractor>(
    session: &mut ExtractionSession,
    documents: &[D],
    extractor: &E,
    table: &ClassificationTable,
) -> Result<(), D::Error> {
    session.processing = true;
    session.reset();
    info!("start_extraction: {} documents", documents.len());

    let mut res: Result<(), D::Error> = Ok(());
    for (idx, document) in documents.iter().enumerate() {
        if let Err(e) = process_file(session, document, idx, documents.len(), extractor, table) {
            warn!("start_extraction: stopping the run: {}", e);
            session.error = Some(format!("Failed to process files: {}", e));
            res = Err(e);
            break;
        }
    }

    session.progress = 100;
    session.processing = false;
    info!(
        "start_extraction: done, {} pages extracted",
        session.results.len()
    );
    res
}
