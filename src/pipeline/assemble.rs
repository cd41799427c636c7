//! Deck assembly: validated outline + image results → a `.pptx` package.
//!
//! ## Layout rules
//!
//! Deterministic, applied in outline order:
//!
//! * slide 0 — title slide: deck title + topic subtitle, no image
//! * slides 1..N — heading in the title region, bullets in a fixed body
//!   region, the resolved image (when usable) in a fixed picture region,
//!   speaker notes in the slide's notes part
//! * optional closing slide — deck title + a thank-you line
//!
//! A failed image leaves the picture region empty; text never reflows to
//! fill it, so two runs over the same outline always place text
//! identically. The assembler treats all text as opaque — shortening is
//! the planner's job.
//!
//! ## Package format
//!
//! A `.pptx` file is an OPC zip container of PresentationML parts. The
//! writer emits the minimal part set readers require: content types,
//! package rels, the presentation part, one slide master + blank layout +
//! theme, a notes master, and per-slide parts with their relationships and
//! media. Zip entries use a fixed timestamp so a fixed input produces
//! byte-identical output.

use crate::config::GenerationConfig;
use crate::error::DeckError;
use crate::outline::Outline;
use crate::output::{BuildReport, ImageResult, ImageStatus};
use std::io::{Cursor, Write};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

// ── Geometry (EMU, 914 400 per inch; 16:9 surface) ───────────────────────

const SLIDE_W: u64 = 12_192_000;
const SLIDE_H: u64 = 6_858_000;

/// Heading region on content slides.
const TITLE_BOX: (u64, u64, u64, u64) = (457_200, 274_638, 11_277_600, 1_143_000);
/// Bullet region; deliberately narrower than the slide so it never
/// overlaps the picture region.
const BODY_BOX: (u64, u64, u64, u64) = (457_200, 1_600_200, 5_334_000, 4_525_963);
/// The single reserved picture region.
const PICTURE_BOX: (u64, u64, u64, u64) = (6_248_400, 1_752_600, 5_486_400, 3_086_100);
/// Centred title block on the title and closing slides.
const HERO_TITLE_BOX: (u64, u64, u64, u64) = (914_400, 2_286_000, 10_363_200, 1_470_025);
const HERO_SUB_BOX: (u64, u64, u64, u64) = (914_400, 3_886_200, 10_363_200, 914_400);

/// Assemble the deck and its build report.
///
/// `images` is indexed by content slide; entries are matched by
/// `slide_index`, never by mutating the outline. Durations in the returned
/// report are zero — the orchestrator owns the clocks.
pub fn assemble(
    outline: &Outline,
    images: &[ImageResult],
    topic: &str,
    config: &GenerationConfig,
) -> Result<(Vec<u8>, BuildReport), DeckError> {
    if outline.slides.is_empty() {
        return Err(DeckError::InvalidOutline {
            detail: "outline has no slides".to_string(),
        });
    }

    let mut report = BuildReport::default();
    let mut writer = PackageWriter::new();

    // Slide 0: title slide.
    writer.add_slide(SlidePage {
        body: title_slide_body(&outline.title, topic),
        image: None,
        notes: None,
    });

    // Content slides, with their image results merged in by index.
    for (i, slide) in outline.slides.iter().enumerate() {
        let resolved = images.iter().find(|r| r.slide_index == i);
        let image = match resolved {
            Some(r) if r.is_usable() => {
                if r.status == ImageStatus::Fallback {
                    report
                        .warnings
                        .push(format!("slide {}: image fallback used", i + 1));
                }
                match r.local_path.as_deref().map(std::fs::read) {
                    Some(Ok(bytes)) => {
                        report.images_resolved += 1;
                        Some(bytes)
                    }
                    Some(Err(e)) => {
                        warn!(slide = i + 1, error = %e, "downloaded image unreadable");
                        report.images_failed += 1;
                        report
                            .warnings
                            .push(format!("slide {}: image file unreadable", i + 1));
                        None
                    }
                    None => {
                        report.images_failed += 1;
                        report
                            .warnings
                            .push(format!("slide {}: image result has no file", i + 1));
                        None
                    }
                }
            }
            other => {
                if config.include_images {
                    report.images_failed += 1;
                    let reason = other
                        .and_then(|r| r.error.as_ref())
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no result".to_string());
                    report.warnings.push(format!("slide {}: no image ({reason})", i + 1));
                }
                None
            }
        };

        writer.add_slide(SlidePage {
            body: content_slide_body(slide, image.is_some()),
            image,
            notes: slide.notes.clone(),
        });
    }

    // Optional closing slide.
    if config.closing_slide {
        writer.add_slide(SlidePage {
            body: closing_slide_body(&outline.title),
            image: None,
            notes: None,
        });
    }

    report.slides_built = outline.slides.len();
    let bytes = writer.finish(&outline.title)?;

    debug!(
        slides = report.slides_built,
        resolved = report.images_resolved,
        failed = report.images_failed,
        bytes = bytes.len(),
        "deck assembled"
    );

    Ok((bytes, report))
}

// ── Package writer ───────────────────────────────────────────────────────

struct SlidePage {
    /// The `<p:spTree>` children for this slide.
    body: String,
    /// JPEG bytes for the picture region, when the slide has one.
    image: Option<Vec<u8>>,
    notes: Option<String>,
}

struct PackageWriter {
    slides: Vec<SlidePage>,
}

impl PackageWriter {
    fn new() -> Self {
        Self { slides: Vec::new() }
    }

    fn add_slide(&mut self, page: SlidePage) {
        self.slides.push(page);
    }

    fn finish(self, deck_title: &str) -> Result<Vec<u8>, DeckError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        // Fixed timestamp (the zip epoch) keeps output byte-identical
        // across runs with identical inputs.
        let opts = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        let internal = |e: zip::result::ZipError| DeckError::Internal(format!("zip write: {e}"));
        let put = |zip: &mut ZipWriter<Cursor<Vec<u8>>>,
                       name: &str,
                       content: &[u8]|
         -> Result<(), DeckError> {
            zip.start_file(name, opts).map_err(internal)?;
            zip.write_all(content)
                .map_err(|e| DeckError::Internal(format!("zip write: {e}")))?;
            Ok(())
        };

        put(&mut zip, "[Content_Types].xml", self.content_types().as_bytes())?;
        put(&mut zip, "_rels/.rels", PACKAGE_RELS.as_bytes())?;
        put(&mut zip, "docProps/core.xml", core_properties(deck_title).as_bytes())?;
        put(&mut zip, "ppt/presentation.xml", self.presentation().as_bytes())?;
        put(
            &mut zip,
            "ppt/_rels/presentation.xml.rels",
            self.presentation_rels().as_bytes(),
        )?;
        put(&mut zip, "ppt/slideMasters/slideMaster1.xml", SLIDE_MASTER.as_bytes())?;
        put(
            &mut zip,
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            SLIDE_MASTER_RELS.as_bytes(),
        )?;
        put(&mut zip, "ppt/slideLayouts/slideLayout1.xml", SLIDE_LAYOUT.as_bytes())?;
        put(
            &mut zip,
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            SLIDE_LAYOUT_RELS.as_bytes(),
        )?;
        put(&mut zip, "ppt/notesMasters/notesMaster1.xml", NOTES_MASTER.as_bytes())?;
        put(
            &mut zip,
            "ppt/notesMasters/_rels/notesMaster1.xml.rels",
            NOTES_MASTER_RELS.as_bytes(),
        )?;
        put(&mut zip, "ppt/theme/theme1.xml", theme_xml("Deck Theme").as_bytes())?;
        put(&mut zip, "ppt/theme/theme2.xml", theme_xml("Notes Theme").as_bytes())?;

        let mut image_no = 0usize;
        for (idx, page) in self.slides.iter().enumerate() {
            let n = idx + 1;

            let image_name = page.image.as_ref().map(|bytes| {
                image_no += 1;
                let name = format!("image{image_no}.jpg");
                (name, bytes)
            });

            put(
                &mut zip,
                &format!("ppt/slides/slide{n}.xml"),
                slide_xml(&page.body).as_bytes(),
            )?;
            put(
                &mut zip,
                &format!("ppt/slides/_rels/slide{n}.xml.rels"),
                slide_rels(
                    image_name.as_ref().map(|(name, _)| name.as_str()),
                    page.notes.is_some().then_some(n),
                )
                .as_bytes(),
            )?;

            if let Some((name, bytes)) = image_name {
                put(&mut zip, &format!("ppt/media/{name}"), bytes)?;
            }

            if let Some(ref notes) = page.notes {
                put(
                    &mut zip,
                    &format!("ppt/notesSlides/notesSlide{n}.xml"),
                    notes_slide_xml(notes).as_bytes(),
                )?;
                put(
                    &mut zip,
                    &format!("ppt/notesSlides/_rels/notesSlide{n}.xml.rels"),
                    notes_slide_rels(n).as_bytes(),
                )?;
            }
        }

        let cursor = zip.finish().map_err(internal)?;
        Ok(cursor.into_inner())
    }

    fn content_types(&self) -> String {
        let mut overrides = String::new();
        for (idx, page) in self.slides.iter().enumerate() {
            let n = idx + 1;
            overrides.push_str(&format!(
                "<Override PartName=\"/ppt/slides/slide{n}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.slide+xml\"/>"
            ));
            if page.notes.is_some() {
                overrides.push_str(&format!(
                    "<Override PartName=\"/ppt/notesSlides/notesSlide{n}.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml\"/>"
                ));
            }
        }
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="jpg" ContentType="image/jpeg"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/notesMasters/notesMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.notesMaster+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/><Override PartName="/ppt/theme/theme2.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>{overrides}</Types>"#
        )
    }

    fn presentation(&self) -> String {
        let slide_ids: String = (0..self.slides.len())
            .map(|i| {
                format!(
                    "<p:sldId id=\"{}\" r:id=\"rId{}\"/>",
                    256 + i,
                    3 + i
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:notesMasterIdLst><p:notesMasterId r:id="rId2"/></p:notesMasterIdLst><p:sldIdLst>{slide_ids}</p:sldIdLst><p:sldSz cx="{SLIDE_W}" cy="{SLIDE_H}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#
        )
    }

    fn presentation_rels(&self) -> String {
        let mut rels = String::from(
            r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesMaster" Target="notesMasters/notesMaster1.xml"/>"#,
        );
        for i in 0..self.slides.len() {
            rels.push_str(&format!(
                "<Relationship Id=\"rId{}\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide\" Target=\"slides/slide{}.xml\"/>",
                3 + i,
                i + 1
            ));
        }
        wrap_rels(&rels)
    }
}

// ── Slide body builders ──────────────────────────────────────────────────

fn title_slide_body(deck_title: &str, topic: &str) -> String {
    format!(
        "{}{}",
        text_box(
            2,
            "Title",
            HERO_TITLE_BOX,
            &[(deck_title, 4400, true)],
            true
        ),
        text_box(3, "Subtitle", HERO_SUB_BOX, &[(topic, 2000, false)], true)
    )
}

fn content_slide_body(slide: &crate::outline::SlideSpec, with_image: bool) -> String {
    let mut body = text_box(
        2,
        "Title",
        TITLE_BOX,
        &[(slide.heading.as_str(), 3200, true)],
        false,
    );
    body.push_str(&bullet_box(3, BODY_BOX, &slide.bullets));
    if with_image {
        body.push_str(&picture(4, PICTURE_BOX));
    }
    body
}

fn closing_slide_body(deck_title: &str) -> String {
    format!(
        "{}{}",
        text_box(
            2,
            "Title",
            HERO_TITLE_BOX,
            &[(deck_title, 4400, true)],
            true
        ),
        text_box(3, "Subtitle", HERO_SUB_BOX, &[("Thank you.", 2000, false)], true)
    )
}

/// A plain text box: one paragraph per `(text, size, bold)` line.
fn text_box(
    id: u32,
    name: &str,
    (x, y, w, h): (u64, u64, u64, u64),
    lines: &[(&str, u32, bool)],
    centred: bool,
) -> String {
    let algn = if centred { " algn=\"ctr\"" } else { "" };
    let paragraphs: String = lines
        .iter()
        .map(|(text, size, bold)| {
            let b = if *bold { " b=\"1\"" } else { "" };
            format!(
                "<a:p><a:pPr{algn}><a:buNone/></a:pPr><a:r><a:rPr lang=\"en-US\" sz=\"{size}\"{b}/><a:t>{}</a:t></a:r></a:p>",
                escape_xml(text)
            )
        })
        .collect();
    shape(id, name, (x, y, w, h), &paragraphs)
}

/// The bullet block: one bulleted paragraph per line, rendered as given.
fn bullet_box(id: u32, (x, y, w, h): (u64, u64, u64, u64), bullets: &[String]) -> String {
    let paragraphs: String = bullets
        .iter()
        .map(|b| {
            format!(
                "<a:p><a:pPr><a:buChar char=\"\u{2022}\"/></a:pPr><a:r><a:rPr lang=\"en-US\" sz=\"2000\"/><a:t>{}</a:t></a:r></a:p>",
                escape_xml(b)
            )
        })
        .collect();
    shape(id, "Content", (x, y, w, h), &paragraphs)
}

fn shape(id: u32, name: &str, (x, y, w, h): (u64, u64, u64, u64), paragraphs: &str) -> String {
    format!(
        "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"{name}\"/><p:cNvSpPr txBox=\"1\"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x=\"{x}\" y=\"{y}\"/><a:ext cx=\"{w}\" cy=\"{h}\"/></a:xfrm><a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr wrap=\"square\"><a:normAutofit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"
    )
}

/// The picture region. `rId2` is fixed: the image relationship is always
/// the second rel a slide carries (after its layout).
fn picture(id: u32, (x, y, w, h): (u64, u64, u64, u64)) -> String {
    format!(
        "<p:pic><p:nvPicPr><p:cNvPr id=\"{id}\" name=\"Picture\"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed=\"rId2\"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x=\"{x}\" y=\"{y}\"/><a:ext cx=\"{w}\" cy=\"{h}\"/></a:xfrm><a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr></p:pic>"
    )
}

// ── Part templates ───────────────────────────────────────────────────────

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const NS: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;

/// The empty group-shape header every spTree starts with.
const SP_TREE_HEAD: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/></Relationships>"#;

fn wrap_rels(body: &str) -> String {
    format!(
        r#"{XML_DECL}
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{body}</Relationships>"#
    )
}

fn core_properties(title: &str) -> String {
    format!(
        r#"{XML_DECL}
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{}</dc:title><dc:creator>topic2deck</dc:creator></cp:coreProperties>"#,
        escape_xml(title)
    )
}

fn slide_xml(body: &str) -> String {
    format!(
        r#"{XML_DECL}
<p:sld {NS}><p:cSld><p:spTree>{SP_TREE_HEAD}{body}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#
    )
}

fn slide_rels(image: Option<&str>, notes_index: Option<usize>) -> String {
    let mut rels = String::from(
        r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/>"#,
    );
    if let Some(name) = image {
        rels.push_str(&format!(
            "<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/image\" Target=\"../media/{name}\"/>"
        ));
    }
    if let Some(n) = notes_index {
        rels.push_str(&format!(
            "<Relationship Id=\"rId3\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide\" Target=\"../notesSlides/notesSlide{n}.xml\"/>"
        ));
    }
    wrap_rels(&rels)
}

fn notes_slide_xml(notes: &str) -> String {
    let paragraphs: String = notes
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            format!(
                "<a:p><a:r><a:rPr lang=\"en-US\" sz=\"1200\"/><a:t>{}</a:t></a:r></a:p>",
                escape_xml(l.trim())
            )
        })
        .collect();
    format!(
        r#"{XML_DECL}
<p:notes {NS}><p:cSld><p:spTree>{SP_TREE_HEAD}<p:sp><p:nvSpPr><p:cNvPr id="2" name="Notes"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="685800" y="4572000"/><a:ext cx="5486400" cy="3657600"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr wrap="square"/><a:lstStyle/>{paragraphs}</p:txBody></p:sp></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:notes>"#
    )
}

fn notes_slide_rels(slide_index: usize) -> String {
    wrap_rels(&format!(
        r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesMaster" Target="../notesMasters/notesMaster1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="../slides/slide{slide_index}.xml"/>"#
    ))
}

const SLIDE_MASTER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#;

const SLIDE_MASTER_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="../theme/theme1.xml"/></Relationships>"#;

const SLIDE_LAYOUT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" type="blank"><p:cSld name="Blank"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#;

const SLIDE_LAYOUT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="../slideMasters/slideMaster1.xml"/></Relationships>"#;

const NOTES_MASTER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:notesMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/></p:notesMaster>"#;

const NOTES_MASTER_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="../theme/theme2.xml"/></Relationships>"#;

/// Minimal but complete DrawingML theme (colour scheme, font scheme, and
/// the three-entry format scheme readers insist on).
fn theme_xml(name: &str) -> String {
    format!(
        r#"{XML_DECL}
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="{name}"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="1F3864"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2><a:accent1><a:srgbClr val="4472C4"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2><a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4><a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6><a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#
    )
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outline::SlideSpec;
    use std::io::Read;
    use std::path::PathBuf;

    fn outline(n: usize) -> Outline {
        Outline {
            title: "Renewables & the Grid".to_string(),
            slides: (1..=n)
                .map(|i| SlideSpec {
                    heading: format!("Section {i}"),
                    bullets: vec![format!("Point {i}.1"), format!("Point {i}.2")],
                    notes: (i == 1).then(|| "Open with the headline number.".to_string()),
                    image_query: "wind turbines".to_string(),
                })
                .collect(),
        }
    }

    fn resolved_image(dir: &tempfile::TempDir, slide_index: usize) -> ImageResult {
        let path = dir.path().join(format!("slide{slide_index}.jpg"));
        std::fs::write(&path, b"\xFF\xD8\xFFfake-jpeg").unwrap();
        ImageResult {
            slide_index,
            url: Some(format!("https://images.example/{slide_index}.jpg")),
            local_path: Some(path),
            attribution: Some("Ada Example".to_string()),
            status: ImageStatus::Resolved,
            error: None,
        }
    }

    fn config() -> GenerationConfig {
        GenerationConfig::default()
    }

    fn zip_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).expect("open zip");
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).expect("open zip");
        let mut part = archive.by_name(name).expect("part present");
        let mut s = String::new();
        part.read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn builds_title_plus_content_slides() {
        let (bytes, report) = assemble(&outline(3), &[], "Renewable Energy", &config()).unwrap();
        let names = zip_names(&bytes);

        // 3 content slides, framed by the title slide (4 parts total).
        assert_eq!(report.slides_built, 3);
        assert!(names.contains(&"ppt/slides/slide1.xml".to_string()));
        assert!(names.contains(&"ppt/slides/slide4.xml".to_string()));
        assert!(!names.contains(&"ppt/slides/slide5.xml".to_string()));
        assert!(names.contains(&"ppt/presentation.xml".to_string()));
        assert!(names.contains(&"[Content_Types].xml".to_string()));
    }

    #[test]
    fn title_slide_carries_title_and_topic_without_image() {
        let (bytes, _) = assemble(&outline(3), &[], "Renewable Energy", &config()).unwrap();
        let slide1 = read_part(&bytes, "ppt/slides/slide1.xml");
        assert!(slide1.contains("Renewables &amp; the Grid"));
        assert!(slide1.contains("Renewable Energy"));
        assert!(!slide1.contains("<p:pic>"));
    }

    #[test]
    fn usable_images_are_embedded_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let images = vec![resolved_image(&dir, 0), resolved_image(&dir, 2)];
        let (bytes, report) = assemble(&outline(3), &images, "Topic", &config()).unwrap();

        assert_eq!(report.images_resolved, 2);
        assert_eq!(report.images_failed, 1);
        let names = zip_names(&bytes);
        assert!(names.contains(&"ppt/media/image1.jpg".to_string()));
        assert!(names.contains(&"ppt/media/image2.jpg".to_string()));

        // Slide 2 (content slide 0) has a picture; slide 3 does not.
        assert!(read_part(&bytes, "ppt/slides/slide2.xml").contains("<p:pic>"));
        assert!(!read_part(&bytes, "ppt/slides/slide3.xml").contains("<p:pic>"));
    }

    #[test]
    fn failed_image_leaves_region_empty_and_warns() {
        let images = vec![ImageResult::failed(
            0,
            crate::error::SlideImageError::NoResults {
                slide: 1,
                query: "wind turbines".into(),
            },
        )];
        let (bytes, report) = assemble(&outline(3), &images, "Topic", &config()).unwrap();

        assert_eq!(report.images_resolved, 0);
        assert_eq!(report.images_failed, 3);
        assert!(report.warnings.iter().any(|w| w.starts_with("slide 1: no image")));
        assert!(!read_part(&bytes, "ppt/slides/slide2.xml").contains("<p:pic>"));
    }

    #[test]
    fn fallback_image_is_placed_and_noted() {
        let dir = tempfile::tempdir().unwrap();
        let mut image = resolved_image(&dir, 0);
        image.status = ImageStatus::Fallback;
        let (bytes, report) = assemble(&outline(3), &[image], "Topic", &config()).unwrap();

        assert_eq!(report.images_resolved, 1);
        assert!(report
            .warnings
            .contains(&"slide 1: image fallback used".to_string()));
        assert!(read_part(&bytes, "ppt/slides/slide2.xml").contains("<p:pic>"));
    }

    #[test]
    fn notes_go_to_the_notes_part_not_the_slide_body() {
        let (bytes, _) = assemble(&outline(3), &[], "Topic", &config()).unwrap();
        // Content slide 1 has notes; it is package slide 2.
        let notes = read_part(&bytes, "ppt/notesSlides/notesSlide2.xml");
        assert!(notes.contains("Open with the headline number."));
        let slide2 = read_part(&bytes, "ppt/slides/slide2.xml");
        assert!(!slide2.contains("headline number"));
        // Slide 3 has no notes and no notes part.
        assert!(!zip_names(&bytes).contains(&"ppt/notesSlides/notesSlide3.xml".to_string()));
    }

    #[test]
    fn closing_slide_is_appended_when_configured() {
        let config = GenerationConfig::builder().closing_slide(true).build().unwrap();
        let (bytes, report) = assemble(&outline(3), &[], "Topic", &config).unwrap();
        assert_eq!(report.slides_built, 3);
        let last = read_part(&bytes, "ppt/slides/slide5.xml");
        assert!(last.contains("Thank you."));
    }

    #[test]
    fn assembly_is_byte_identical_for_fixed_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let images = vec![resolved_image(&dir, 0), resolved_image(&dir, 1)];
        let outline = outline(3);
        let config = config();

        let (a, _) = assemble(&outline, &images, "Topic", &config).unwrap();
        let (b, _) = assemble(&outline, &images, "Topic", &config).unwrap();
        assert_eq!(a, b, "two assemblies of the same inputs must match");
    }

    #[test]
    fn empty_outline_is_rejected() {
        let empty = Outline {
            title: "T".into(),
            slides: vec![],
        };
        assert!(matches!(
            assemble(&empty, &[], "Topic", &config()),
            Err(DeckError::InvalidOutline { .. })
        ));
    }

    #[test]
    fn xml_special_characters_are_escaped() {
        let mut o = outline(3);
        o.slides[0].heading = r#"Profit & Loss <2025> "Q1""#.to_string();
        let (bytes, _) = assemble(&o, &[], "Topic", &config()).unwrap();
        let slide2 = read_part(&bytes, "ppt/slides/slide2.xml");
        assert!(slide2.contains("Profit &amp; Loss &lt;2025&gt; &quot;Q1&quot;"));
        assert!(!slide2.contains("Profit & Loss"));
    }

    #[test]
    fn missing_local_file_degrades_to_warning() {
        let images = vec![ImageResult {
            slide_index: 0,
            url: Some("https://images.example/gone.jpg".into()),
            local_path: Some(PathBuf::from("/definitely/not/here.jpg")),
            attribution: None,
            status: ImageStatus::Resolved,
            error: None,
        }];
        let (_, report) = assemble(&outline(3), &images, "Topic", &config()).unwrap();
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("image file unreadable")));
    }
}
