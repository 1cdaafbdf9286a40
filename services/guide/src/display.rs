//! Console display and speech output for the guide binary.

use guide_core::collaborators::Speaker;
use guide_core::frame::HighlightImage;
use guide_core::session::{DisplayImage, SessionState};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Renders session changes: text to a writer, highlight images to files.
pub struct DisplaySink<W: Write> {
    out: W,
    output_dir: PathBuf,
    last_revision: Option<u64>,
    last_saved: Option<Vec<u8>>,
    saved_images: usize,
}

impl<W: Write> DisplaySink<W> {
    pub fn new(out: W, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            out,
            output_dir: output_dir.into(),
            last_revision: None,
            last_saved: None,
            saved_images: 0,
        }
    }

    /// Redraws if the session changed since the last call.
    ///
    /// Returns the path of a highlight image written during this redraw.
    pub fn render(&mut self, session: &SessionState) -> std::io::Result<Option<PathBuf>> {
        if self.last_revision == Some(session.revision()) {
            return Ok(None);
        }
        self.last_revision = Some(session.revision());

        let mut saved = None;
        let image_note = match session.display_image() {
            DisplayImage::Blank => "blank".to_string(),
            DisplayImage::Live => "live camera".to_string(),
            DisplayImage::Snapshot(frame) => format!("snapshot {}x{}", frame.width, frame.height),
            DisplayImage::Highlight(image) => match self.save_highlight(image) {
                Some(path) => {
                    let note = format!("highlight {}", path.display());
                    saved = Some(path);
                    note
                }
                None => format!("highlight {}x{}", image.width(), image.height()),
            },
        };

        writeln!(self.out, "[{}] {}", image_note, session.display_text())?;
        self.out.flush()?;
        Ok(saved)
    }

    /// Writes a highlight image unless it is the one saved last.
    fn save_highlight(&mut self, image: &HighlightImage) -> Option<PathBuf> {
        if self.last_saved.as_deref() == Some(image.encoded.as_slice()) {
            return None;
        }
        let path = self.output_dir.join(format!(
            "highlight_{:03}.{}",
            self.saved_images,
            image.extension()
        ));
        match write_file(&self.output_dir, &path, &image.encoded) {
            Ok(()) => {
                info!(path = %path.display(), "Saved highlight image");
                self.saved_images += 1;
                self.last_saved = Some(image.encoded.clone());
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Failed to save highlight image");
                None
            }
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn write_file(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(path, bytes)
}

/// A speaker that writes utterances to the log instead of playing audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, utterance: &str) {
        info!(%utterance, "Speaking");
    }
}
