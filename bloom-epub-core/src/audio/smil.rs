//! SMIL media overlay documents

use super::AudioOverlaySegment;
use crate::dom::XmlBuilder;
use crate::error::DomError;
use crate::manifest::format_clock;

const SMIL_NS: &str = "http://www.w3.org/ns/SMIL";
const EPUB_NS: &str = "http://www.idpf.org/2007/ops";

/// Overlay file name for a page: `3.xhtml` -> `3_overlay.smil`
pub fn overlay_name(page_name: &str) -> String {
    let stem = page_name.rsplit_once('.').map_or(page_name, |(stem, _)| stem);
    format!("{}_overlay.smil", stem)
}

/// One `<par>` per segment, numbered `s1`, `s2`, ... in playback order
pub fn write_smil(page_name: &str, segments: &[AudioOverlaySegment]) -> Result<String, DomError> {
    let mut xml = XmlBuilder::new();
    xml.declaration()?
        .start("smil", &[("xmlns", SMIL_NS), ("xmlns:epub", EPUB_NS), ("version", "3.0")])?
        .start("body", &[])?
        .start(
            "seq",
            &[
                ("id", "id1"),
                ("epub:textref", page_name),
                ("epub:type", "bodymatter chapter"),
            ],
        )?;
    for (index, segment) in segments.iter().enumerate() {
        let par_id = format!("s{}", index + 1);
        let text_src = format!("{}#{}", page_name, segment.text_id);
        let begin = format_clock(segment.clip_begin);
        let end = format_clock(segment.clip_end);
        xml.start("par", &[("id", par_id.as_str())])?
            .empty("text", &[("src", text_src.as_str())])?
            .empty(
                "audio",
                &[
                    ("src", segment.audio_file.as_str()),
                    ("clipBegin", begin.as_str()),
                    ("clipEnd", end.as_str()),
                ],
            )?
            .end("par")?;
    }
    xml.end("seq")?.end("body")?.end("smil")?;
    xml.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_overlay_name() {
        assert_eq!(overlay_name("3.xhtml"), "3_overlay.smil");
        assert_eq!(overlay_name("page"), "page_overlay.smil");
    }

    #[test]
    fn test_smil_document() {
        let segments = vec![AudioOverlaySegment {
            text_id: "i1".to_string(),
            audio_file: "i1.mp3".to_string(),
            clip_begin: Duration::ZERO,
            clip_end: Duration::from_millis(2500),
        }];
        let smil = write_smil("2.xhtml", &segments).unwrap();
        insta::assert_snapshot!(smil, @r###"
        <?xml version="1.0" encoding="utf-8"?>
        <smil xmlns="http://www.w3.org/ns/SMIL" xmlns:epub="http://www.idpf.org/2007/ops" version="3.0">
          <body>
            <seq id="id1" epub:textref="2.xhtml" epub:type="bodymatter chapter">
              <par id="s1">
                <text src="2.xhtml#i1"/>
                <audio src="i1.mp3" clipBegin="0:00:00.000" clipEnd="0:00:02.500"/>
              </par>
            </seq>
          </body>
        </smil>
        "###);
    }
}
