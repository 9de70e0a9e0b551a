//! Narration: finding recorded audio for page text and synchronizing it with
//! SMIL media overlays

mod duration;
mod smil;

pub use duration::{clip_duration, estimated_duration, parse_seconds, wav_duration};
pub use smil::{overlay_name, write_smil};

use crate::dom::Document;
use crate::error::Result;
use crate::staging::StagingContext;
use duration::parse_end_times;
use ego_tree::NodeId;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Folder of the book that holds narration recordings
pub const AUDIO_FOLDER: &str = "audio";

/// Position of elements without `data-audio-order`: after every element that has one
const DEFAULT_AUDIO_ORDER: i32 = 999;

/// Finds the recordings that belong to page elements
pub trait AudioResolver: Send + Sync {
    /// The publishable (compressed) recording for an element id, if there is one
    fn compressed_audio_for(&self, book_folder: &Path, id: &str) -> Option<PathBuf>;

    /// Whether any of these elements has no recording at all
    fn is_any_audio_missing(&self, book_folder: &Path, ids: &[String]) -> bool;
}

/// Looks for `audio/{id}.mp3` in the book folder.
///
/// A lone `.wav` recording counts as present for [`AudioResolver::is_any_audio_missing`]
/// but is not published, since nothing here encodes audio.
#[derive(Debug, Default, Clone, Copy)]
pub struct FolderAudioResolver;

impl AudioResolver for FolderAudioResolver {
    fn compressed_audio_for(&self, book_folder: &Path, id: &str) -> Option<PathBuf> {
        if id.is_empty() {
            return None;
        }
        let path = book_folder.join(AUDIO_FOLDER).join(format!("{}.mp3", id));
        path.is_file().then_some(path)
    }

    fn is_any_audio_missing(&self, book_folder: &Path, ids: &[String]) -> bool {
        let folder = book_folder.join(AUDIO_FOLDER);
        ids.iter().any(|id| {
            !folder.join(format!("{}.mp3", id)).is_file()
                && !folder.join(format!("{}.wav", id)).is_file()
        })
    }
}

/// One `<par>` of an overlay
#[derive(Debug, Clone, PartialEq)]
pub struct AudioOverlaySegment {
    /// Id of the highlighted text element
    pub text_id: String,
    /// Packaged audio file name
    pub audio_file: String,
    pub clip_begin: Duration,
    pub clip_end: Duration,
}

/// The overlay written for one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageOverlay {
    pub name: String,
    pub id: String,
    pub duration: Duration,
    pub segments: usize,
}

/// Ids of the elements marked for narration, whether recorded or not
pub fn audio_sentence_ids(doc: &Document) -> Vec<String> {
    doc.select_all(|el| el.has_class("audio-sentence"))
        .into_iter()
        .filter_map(|id| doc.element(id).and_then(|el| el.id()).map(str::to_string))
        .collect()
}

fn audio_order(doc: &Document, id: NodeId) -> i32 {
    doc.element(id)
        .and_then(|el| el.attr("data-audio-order"))
        .and_then(|order| order.trim().parse().ok())
        .unwrap_or(DEFAULT_AUDIO_ORDER)
}

fn new_segment_id() -> String {
    let id = Uuid::new_v4().to_string();
    if id.starts_with(|c: char| c.is_ascii_digit()) {
        format!("i{}", id)
    } else {
        id
    }
}

/// Builds the media overlay of one page
pub struct AudioOverlayBuilder<'a> {
    resolver: &'a dyn AudioResolver,
}

impl<'a> AudioOverlayBuilder<'a> {
    pub fn new(resolver: &'a dyn AudioResolver) -> Self {
        Self { resolver }
    }

    /// Write `{stem}_overlay.smil` for the page if any of its elements is narrated.
    ///
    /// Recordings are copied into the package, the overlay is registered with its
    /// duration, and the page's manifest item (registered beforehand) is linked to it.
    pub fn build(
        &self,
        doc: &mut Document,
        page_name: &str,
        ctx: &mut StagingContext,
    ) -> Result<Option<PageOverlay>> {
        let mut narrated: Vec<(NodeId, String, PathBuf)> = doc
            .select_all(|el| el.id().is_some() && !el.has_class("bloom-highlightSegment"))
            .into_iter()
            .filter_map(|node| {
                let id = doc.element(node)?.id()?.to_string();
                let audio = self.resolver.compressed_audio_for(ctx.book_folder(), &id)?;
                Some((node, id, audio))
            })
            .collect();
        if narrated.is_empty() {
            return Ok(None);
        }
        // Stable, so equal orders keep document order
        narrated.sort_by_key(|(node, _, _)| audio_order(doc, *node));

        let mut segments = Vec::new();
        let mut page_duration = Duration::ZERO;
        for (node, id, audio) in narrated {
            let Some(audio_file) = ctx.copy_to_staging(&audio)? else {
                continue;
            };
            let highlights: Vec<NodeId> = doc
                .select(node, |el| el.has_class("bloom-highlightSegment"))
                .into_iter()
                .filter(|segment| *segment != node)
                .collect();

            if highlights.is_empty() {
                let data_duration = doc
                    .element(node)
                    .and_then(|el| el.attr("data-duration"))
                    .map(str::to_string);
                let clip = clip_duration(data_duration.as_deref(), &audio);
                segments.push(AudioOverlaySegment {
                    text_id: id,
                    audio_file,
                    clip_begin: Duration::ZERO,
                    clip_end: clip,
                });
                page_duration = page_duration.saturating_add(clip);
            } else {
                let split = self.split_segments(doc, node, &highlights, &audio_file, &mut segments);
                page_duration = page_duration.saturating_add(split);
            }
        }
        if segments.is_empty() {
            return Ok(None);
        }

        let name = overlay_name(page_name);
        let smil = write_smil(page_name, &segments)?;
        let overlay_id = ctx.write_content(&name, &smil)?;
        let manifest = ctx.manifest_mut();
        if let Some(item) = manifest.item_by_href_mut(&name) {
            item.duration = Some(page_duration);
        }
        if let Some(page) = manifest.item_by_href_mut(page_name) {
            page.media_overlay = Some(overlay_id.clone());
        }
        tracing::debug!(
            "Overlay {} has {} segments lasting {:?}",
            name,
            segments.len(),
            page_duration
        );

        Ok(Some(PageOverlay {
            name,
            id: overlay_id,
            duration: page_duration,
            segments: segments.len(),
        }))
    }

    /// One segment per highlighted span of a recording that was split at
    /// `data-audiorecordingendtimes`. Returns the length of the whole element.
    fn split_segments(
        &self,
        doc: &mut Document,
        node: NodeId,
        highlights: &[NodeId],
        audio_file: &str,
        segments: &mut Vec<AudioOverlaySegment>,
    ) -> Duration {
        let timings = doc
            .element(node)
            .and_then(|el| {
                el.attr("data-audiorecordingendtimes")
                    .filter(|t| !t.trim().is_empty())
                    .or_else(|| el.attr("data-duration"))
            })
            .unwrap_or_default()
            .to_string();
        let end_times = parse_end_times(&timings);

        let mut element_duration = Duration::ZERO;
        let mut previous_end = 0.0;
        for (segment, end) in highlights.iter().zip(end_times) {
            // Unknown or non-increasing end times come from failed automatic splitting
            if end.is_nan() || end <= previous_end {
                continue;
            }
            // Infinite or huge end times cannot be represented; skip them like unknown ones
            let Some(clip_end) = Duration::try_from_secs_f64(end - previous_end)
                .ok()
                .and_then(|clip| element_duration.checked_add(clip))
            else {
                continue;
            };
            previous_end = end;

            let text_id = match doc.element(*segment).and_then(|el| el.id()) {
                Some(id) => id.to_string(),
                None => {
                    let id = new_segment_id();
                    doc.update(*segment, |el| el.set_attr("id", id.as_str()));
                    id
                }
            };
            segments.push(AudioOverlaySegment {
                text_id,
                audio_file: audio_file.to_string(),
                clip_begin: element_duration,
                clip_end,
            });
            element_duration = clip_end;
        }
        element_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestItem;
    use tempfile::TempDir;

    fn book_with_audio(ids: &[&str]) -> (TempDir, StagingContext) {
        let dir = tempfile::tempdir().unwrap();
        let book = dir.path().join("book");
        std::fs::create_dir_all(book.join(AUDIO_FOLDER)).unwrap();
        for id in ids {
            std::fs::write(book.join(AUDIO_FOLDER).join(format!("{}.mp3", id)), b"mp3").unwrap();
        }
        let mut ctx = StagingContext::create(&book, &dir.path().join("stage"), Vec::new()).unwrap();
        ctx.manifest_mut()
            .add_item(ManifestItem::new("f1", "1.xhtml", "application/xhtml+xml"));
        (dir, ctx)
    }

    #[test]
    fn test_folder_resolver() {
        let (_dir, ctx) = book_with_audio(&["i1"]);
        let book = ctx.book_folder();
        std::fs::write(book.join(AUDIO_FOLDER).join("i2.wav"), b"wav").unwrap();

        let resolver = FolderAudioResolver;
        assert!(resolver.compressed_audio_for(book, "i1").is_some());
        assert!(resolver.compressed_audio_for(book, "i2").is_none());
        assert!(resolver.compressed_audio_for(book, "").is_none());
        assert!(!resolver.is_any_audio_missing(book, &["i1".into(), "i2".into()]));
        assert!(resolver.is_any_audio_missing(book, &["i1".into(), "i3".into()]));
    }

    #[test]
    fn test_two_narrated_spans_of_five() {
        let (_dir, mut ctx) = book_with_audio(&["s2", "s4"]);
        let mut doc = Document::parse(
            r#"<html><body><p>
            <span id="s1" class="audio-sentence">One</span>
            <span id="s2" class="audio-sentence" data-duration="1.5">Two</span>
            <span id="s3" class="audio-sentence">Three</span>
            <span id="s4" class="audio-sentence" data-duration="2.25">Four</span>
            <span id="s5" class="audio-sentence">Five</span>
            </p></body></html>"#,
        )
        .unwrap();

        let builder = AudioOverlayBuilder::new(&FolderAudioResolver);
        let overlay = builder.build(&mut doc, "1.xhtml", &mut ctx).unwrap().unwrap();
        assert_eq!(overlay.name, "1_overlay.smil");
        assert_eq!(overlay.segments, 2);
        assert_eq!(overlay.duration, Duration::from_millis(3750));

        let smil = std::fs::read_to_string(ctx.content_dir().join("1_overlay.smil")).unwrap();
        assert_eq!(smil.matches("<par ").count(), 2);
        assert!(smil.contains(r#"src="1.xhtml#s2""#));
        assert!(ctx.content_dir().join("s4.mp3").is_file());

        let manifest = ctx.manifest();
        assert_eq!(manifest.total_duration(), Duration::from_millis(3750));
        assert_eq!(
            manifest.item_by_href("1.xhtml").unwrap().media_overlay.as_deref(),
            Some(overlay.id.as_str())
        );
    }

    #[test]
    fn test_audio_order_then_document_order() {
        let (_dir, mut ctx) = book_with_audio(&["a", "b", "c"]);
        let mut doc = Document::parse(
            r#"<div><p id="a" data-duration="1">A</p><p id="b" data-audio-order="2" data-duration="1">B</p><p id="c" data-audio-order="1" data-duration="1">C</p></div>"#,
        )
        .unwrap();
        AudioOverlayBuilder::new(&FolderAudioResolver)
            .build(&mut doc, "1.xhtml", &mut ctx)
            .unwrap();
        let smil = std::fs::read_to_string(ctx.content_dir().join("1_overlay.smil")).unwrap();
        let c = smil.find("1.xhtml#c").unwrap();
        let b = smil.find("1.xhtml#b").unwrap();
        let a = smil.find("1.xhtml#a").unwrap();
        assert!(c < b && b < a);
    }

    #[test]
    fn test_highlight_segments_skip_bad_end_times() {
        let (_dir, mut ctx) = book_with_audio(&["box"]);
        let mut doc = Document::parse(
            r#"<div id="box" class="audio-sentence" data-audiorecordingendtimes="1.0 NaN 0.5 2.5">
            <span id="h1" class="bloom-highlightSegment">a</span>
            <span id="h2" class="bloom-highlightSegment">b</span>
            <span id="h3" class="bloom-highlightSegment">c</span>
            <span class="bloom-highlightSegment">d</span>
            </div>"#,
        )
        .unwrap();
        let overlay = AudioOverlayBuilder::new(&FolderAudioResolver)
            .build(&mut doc, "1.xhtml", &mut ctx)
            .unwrap()
            .unwrap();
        assert_eq!(overlay.segments, 2);
        assert_eq!(overlay.duration, Duration::from_millis(2500));

        let smil = std::fs::read_to_string(ctx.content_dir().join("1_overlay.smil")).unwrap();
        assert!(smil.contains("1.xhtml#h1"));
        assert!(!smil.contains("1.xhtml#h2"));
        assert!(smil.contains(r#"clipBegin="0:00:01.000" clipEnd="0:00:02.500""#));

        // The last span had no id; it was given one so the overlay can point at it
        let spans = doc.select_all(|el| el.has_class("bloom-highlightSegment"));
        let last = doc.element(spans[3]).unwrap().id().unwrap().to_string();
        assert!(smil.contains(&format!("1.xhtml#{}", last)));
    }

    #[test]
    fn test_highlight_segments_skip_unrepresentable_end_times() {
        let (_dir, mut ctx) = book_with_audio(&["box"]);
        let mut doc = Document::parse(
            r#"<div id="box" class="audio-sentence" data-audiorecordingendtimes="1.5 inf 1e30">
            <span id="h1" class="bloom-highlightSegment">a</span>
            <span id="h2" class="bloom-highlightSegment">b</span>
            <span id="h3" class="bloom-highlightSegment">c</span>
            </div>"#,
        )
        .unwrap();
        let overlay = AudioOverlayBuilder::new(&FolderAudioResolver)
            .build(&mut doc, "1.xhtml", &mut ctx)
            .unwrap()
            .unwrap();
        assert_eq!(overlay.segments, 1);
        assert_eq!(overlay.duration, Duration::from_millis(1500));
    }

    #[test]
    fn test_page_without_recordings() {
        let (_dir, mut ctx) = book_with_audio(&[]);
        let mut doc = Document::parse(r#"<p id="quiet" class="audio-sentence">x</p>"#).unwrap();
        let overlay = AudioOverlayBuilder::new(&FolderAudioResolver)
            .build(&mut doc, "1.xhtml", &mut ctx)
            .unwrap();
        assert!(overlay.is_none());
        assert!(!ctx.content_dir().join("1_overlay.smil").exists());
        assert_eq!(audio_sentence_ids(&doc), vec!["quiet".to_string()]);
    }
}
