use std::collections::BTreeMap;
use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use pdf_writer::types::{CidFontType, FontFlags, SystemInfo, UnicodeCmap};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str, TextStr};

use super::layout::{Op, PAGE_HEIGHT, PAGE_WIDTH, Page};
use super::{FontAsset, FontRole, FontSet, Logo};

const PRODUCER: &str = concat!("interview-report-generator ", env!("CARGO_PKG_VERSION"));

const LOGO_RESOURCE: Name<'static> = Name(b"Im1");
const WATERMARK_STATE: Name<'static> = Name(b"GS1");
const WATERMARK_OPACITY: f32 = 0.05;

/// One embedded font and the glyphs the document uses from it.
struct EmbeddedFont<'a> {
    resource: String,
    asset: &'a FontAsset,
    glyphs: BTreeMap<u16, char>,
}

/// Roles that name the same asset share one embedded font.
fn embedded_fonts<'a>(fonts: &'a FontSet) -> (Vec<EmbeddedFont<'a>>, [usize; 2]) {
    let mut embedded: Vec<EmbeddedFont<'a>> = Vec::new();
    let mut index = [0; 2];
    for role in [FontRole::Body, FontRole::Heading] {
        let asset = fonts.get(role);
        index[slot(role)] = match embedded.iter().position(|f| f.asset.name() == asset.name()) {
            Some(i) => i,
            None => {
                embedded.push(EmbeddedFont {
                    resource: format!("F{}", embedded.len() + 1),
                    asset,
                    glyphs: BTreeMap::new(),
                });
                embedded.len() - 1
            }
        };
    }
    (embedded, index)
}

fn slot(role: FontRole) -> usize {
    match role {
        FontRole::Body => 0,
        FontRole::Heading => 1,
    }
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

/// PDF base font names may not contain whitespace or delimiters.
fn base_font_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

fn encode(font: &mut EmbeddedFont<'_>, text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() * 2);
    for c in text.chars() {
        let gid = font.asset.glyph(c);
        if gid != 0 {
            font.glyphs.entry(gid).or_insert(c);
        }
        bytes.extend_from_slice(&gid.to_be_bytes());
    }
    bytes
}

fn page_content(page: &Page, fonts: &mut [EmbeddedFont<'_>], index: [usize; 2]) -> Vec<u8> {
    let mut content = Content::new();

    for op in page.all_ops() {
        match op {
            Op::Text {
                role,
                size,
                x,
                y,
                color,
                text,
            } => {
                let font = &mut fonts[index[slot(*role)]];
                let encoded = encode(font, text);
                let (r, g, b) = color.unit();
                content.set_fill_rgb(r, g, b);
                content.begin_text();
                content.set_font(Name(font.resource.as_bytes()), *size);
                content.next_line(*x, *y);
                content.show(Str(&encoded));
                content.end_text();
            }
            Op::Rect {
                x,
                y,
                width,
                height,
                fill,
                stroke,
            } => {
                let (r, g, b) = fill.unit();
                content.set_fill_rgb(r, g, b);
                content.rect(*x, *y, *width, *height);
                match stroke {
                    Some(stroke) => {
                        let (r, g, b) = stroke.unit();
                        content.set_stroke_rgb(r, g, b);
                        content.set_line_width(0.75);
                        content.fill_nonzero_and_stroke();
                    }
                    None => {
                        content.fill_nonzero();
                    }
                }
            }
            Op::Line {
                from,
                to,
                width,
                color,
            } => {
                let (r, g, b) = color.unit();
                content.set_stroke_rgb(r, g, b);
                content.set_line_width(*width);
                content.move_to(from.0, from.1);
                content.line_to(to.0, to.1);
                content.stroke();
            }
            Op::Image {
                x,
                y,
                width,
                height,
                watermark,
            } => {
                content.save_state();
                if *watermark {
                    content.set_parameters(WATERMARK_STATE);
                }
                content.transform([*width, 0.0, 0.0, *height, *x, *y]);
                content.x_object(LOGO_RESOURCE);
                content.restore_state();
            }
        }
    }

    content.finish()
}

fn write_font(pdf: &mut Pdf, alloc: &mut Ref, font: &EmbeddedFont<'_>) -> Ref {
    let type0_ref = alloc.bump();
    let cid_ref = alloc.bump();
    let descriptor_ref = alloc.bump();
    let cmap_ref = alloc.bump();
    let file_ref = alloc.bump();

    let asset = font.asset;
    let base_font = base_font_name(asset.name());
    let system_info = SystemInfo {
        registry: Str(b"Adobe"),
        ordering: Str(b"Identity"),
        supplement: 0,
    };

    pdf.type0_font(type0_ref)
        .base_font(Name(base_font.as_bytes()))
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_ref)
        .to_unicode(cmap_ref);

    let mut cid = pdf.cid_font(cid_ref);
    cid.subtype(CidFontType::Type2)
        .base_font(Name(base_font.as_bytes()))
        .system_info(system_info)
        .font_descriptor(descriptor_ref)
        .default_width(asset.to_pdf_units(f32::from(asset.advance(0))))
        .cid_to_gid_map_predefined(Name(b"Identity"));
    {
        let mut widths = cid.widths();
        for &gid in font.glyphs.keys() {
            widths.consecutive(gid, [asset.to_pdf_units(f32::from(asset.advance(gid)))]);
        }
    }
    cid.finish();

    let [x_min, y_min, x_max, y_max] = asset.bbox();
    let mut flags = FontFlags::NON_SYMBOLIC;
    if asset.italic_angle() != 0.0 {
        flags |= FontFlags::ITALIC;
    }
    pdf.font_descriptor(descriptor_ref)
        .name(Name(base_font.as_bytes()))
        .flags(flags)
        .bbox(Rect::new(x_min, y_min, x_max, y_max))
        .italic_angle(asset.italic_angle())
        .ascent(asset.ascender())
        .descent(asset.descender())
        .cap_height(asset.cap_height())
        .stem_v(80.0)
        .font_file2(file_ref);

    let mut cmap = UnicodeCmap::<u16>::new(Name(b"Custom"), system_info);
    for (&gid, &c) in &font.glyphs {
        cmap.pair(gid, c);
    }
    let cmap = cmap.finish();
    pdf.cmap(cmap_ref, &cmap);

    let data = asset.data();
    let compressed = deflate(data);
    pdf.stream(file_ref, &compressed)
        .filter(Filter::FlateDecode)
        .pair(Name(b"Length1"), data.len() as i32);

    type0_ref
}

/// Writes the logo as an image XObject, with a soft mask when it has
/// transparency, and the graphics state used for the watermark.
fn write_logo(pdf: &mut Pdf, alloc: &mut Ref, logo: &Logo) -> (Ref, Ref) {
    let image_ref = alloc.bump();
    let state_ref = alloc.bump();
    let width = logo.width() as i32;
    let height = logo.height() as i32;

    let mask_ref = logo.alpha().map(|alpha| {
        let mask_ref = alloc.bump();
        let compressed = deflate(alpha);
        let mut mask = pdf.image_xobject(mask_ref, &compressed);
        mask.filter(Filter::FlateDecode);
        mask.width(width);
        mask.height(height);
        mask.color_space().device_gray();
        mask.bits_per_component(8);
        mask.finish();
        mask_ref
    });

    let compressed = deflate(logo.rgb());
    let mut image = pdf.image_xobject(image_ref, &compressed);
    image.filter(Filter::FlateDecode);
    image.width(width);
    image.height(height);
    image.color_space().device_rgb();
    image.bits_per_component(8);
    if let Some(mask_ref) = mask_ref {
        image.s_mask(mask_ref);
    }
    image.finish();

    pdf.ext_graphics(state_ref)
        .non_stroking_alpha(WATERMARK_OPACITY);

    (image_ref, state_ref)
}

/// Serialises laid out pages. Output depends only on the pages, the
/// fonts, the logo and the title, so equal input gives equal bytes.
pub(crate) fn write_pdf(
    pages: &[Page],
    fonts: &FontSet,
    logo: Option<&Logo>,
    title: &str,
) -> Vec<u8> {
    let mut pdf = Pdf::new();
    let mut alloc = Ref::new(1);
    let catalog_ref = alloc.bump();
    let tree_ref = alloc.bump();
    let info_ref = alloc.bump();

    let (mut embedded, index) = embedded_fonts(fonts);

    // Content first, so the glyph sets are complete before fonts are written.
    let contents: Vec<Vec<u8>> = pages
        .iter()
        .map(|page| deflate(&page_content(page, &mut embedded, index)))
        .collect();

    let page_refs: Vec<(Ref, Ref)> = pages.iter().map(|_| (alloc.bump(), alloc.bump())).collect();

    pdf.catalog(catalog_ref).pages(tree_ref);
    pdf.pages(tree_ref)
        .kids(page_refs.iter().map(|(page, _)| *page))
        .count(page_refs.len() as i32);

    let font_refs: Vec<Ref> = embedded
        .iter()
        .map(|font| write_font(&mut pdf, &mut alloc, font))
        .collect();
    let logo_refs = logo.map(|logo| write_logo(&mut pdf, &mut alloc, logo));

    for ((page_ref, content_ref), content) in page_refs.iter().zip(&contents) {
        let mut page = pdf.page(*page_ref);
        page.media_box(Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT))
            .parent(tree_ref)
            .contents(*content_ref);
        {
            let mut resources = page.resources();
            {
                let mut dict = resources.fonts();
                for (font, font_ref) in embedded.iter().zip(&font_refs) {
                    dict.pair(Name(font.resource.as_bytes()), *font_ref);
                }
            }
            if let Some((image_ref, state_ref)) = logo_refs {
                resources.x_objects().pair(LOGO_RESOURCE, image_ref);
                resources.ext_g_states().pair(WATERMARK_STATE, state_ref);
            }
        }
        page.finish();

        pdf.stream(*content_ref, content).filter(Filter::FlateDecode);
    }

    pdf.document_info(info_ref)
        .title(TextStr(title))
        .producer(TextStr(PRODUCER));

    pdf.finish()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::render::Rgb;

    const SANS: &[u8] = include_bytes!("../../fonts/DejaVuSans.ttf");
    const BOLD: &[u8] = include_bytes!("../../fonts/DejaVuSans-Bold.ttf");

    fn font(name: &str, data: &[u8]) -> Arc<FontAsset> {
        Arc::new(FontAsset::from_bytes(name, data.to_vec()).unwrap())
    }

    fn text_page(text: &str, role: FontRole) -> Page {
        Page {
            background: Vec::new(),
            ops: vec![Op::Text {
                role,
                size: 10.0,
                x: 50.0,
                y: 700.0,
                color: Rgb::TEXT,
                text: text.into(),
            }],
            furniture: vec![Op::Line {
                from: (50.0, 60.0),
                to: (545.0, 60.0),
                width: 0.5,
                color: Rgb::MUTED,
            }],
        }
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn test_writes_page_tree_and_embedded_fonts() {
        let fonts = FontSet {
            body: font("Sans", SANS),
            heading: font("Sans-Bold", BOLD),
        };
        let pages = [
            text_page("Q3 sales rose 4%.", FontRole::Body),
            text_page("Summary", FontRole::Heading),
        ];
        let bytes = write_pdf(&pages, &fonts, None, "Q3 sales");

        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(count(&bytes, b"/Type /Page\n"), 2);
        assert_eq!(count(&bytes, b"/FontFile2"), 2);
        assert_eq!(count(&bytes, b"/Identity-H"), 2);
        assert!(count(&bytes, b"/ToUnicode") >= 2);
        assert!(count(&bytes, b"/BaseFont /Sans-Bold") >= 1);
    }

    #[test]
    fn test_same_asset_for_both_roles_is_embedded_once() {
        let sans = font("Sans", SANS);
        let fonts = FontSet {
            body: sans.clone(),
            heading: sans,
        };
        let pages = [text_page("x", FontRole::Heading)];
        let bytes = write_pdf(&pages, &fonts, None, "x");
        assert_eq!(count(&bytes, b"/FontFile2"), 1);
    }

    #[test]
    fn test_encodes_glyph_ids_big_endian() {
        let sans = font("Sans", SANS);
        let fonts = FontSet {
            body: sans.clone(),
            heading: sans.clone(),
        };
        let (mut embedded, _) = embedded_fonts(&fonts);
        let bytes = encode(&mut embedded[0], "Aş");
        let a = sans.glyph('A');
        let s = sans.glyph('ş');
        assert_eq!(bytes, [a.to_be_bytes(), s.to_be_bytes()].concat());
        assert_eq!(embedded[0].glyphs.get(&a), Some(&'A'));
        assert_eq!(embedded[0].glyphs.get(&s), Some(&'ş'));
    }

    #[test]
    fn test_watermark_uses_transparent_state() {
        let fonts = FontSet {
            body: font("Sans", SANS),
            heading: font("Sans-Bold", BOLD),
        };
        let logo = Logo::from_bytes("logo", &crate::render::logo::tests::png(2, 2, 255)).unwrap();
        let mut page = text_page("x", FontRole::Body);
        page.background.push(Op::Image {
            x: 100.0,
            y: 300.0,
            width: 400.0,
            height: 400.0,
            watermark: true,
        });
        let bytes = write_pdf(&[page], &fonts, Some(&logo), "x");

        assert_eq!(count(&bytes, b"/Subtype /Image"), 1);
        assert_eq!(count(&bytes, b"/SMask"), 0);
        assert_eq!(count(&bytes, b"/Type /ExtGState"), 1);
        assert_eq!(count(&bytes, b"/GS1"), 1);
        assert_eq!(count(&bytes, b"/Im1"), 1);
    }

    #[test]
    fn test_watermark_content_sets_state_before_drawing() {
        let fonts = FontSet {
            body: font("Sans", SANS),
            heading: font("Sans-Bold", BOLD),
        };
        let (mut embedded, index) = embedded_fonts(&fonts);
        let page = Page {
            background: vec![Op::Image {
                x: 10.0,
                y: 20.0,
                width: 30.0,
                height: 40.0,
                watermark: true,
            }],
            ..Page::default()
        };
        let content = String::from_utf8(page_content(&page, &mut embedded, index)).unwrap();
        let gs = content.find("/GS1 gs").unwrap();
        let draw = content.find("/Im1 Do").unwrap();
        assert!(content.starts_with("q"));
        assert!(gs < draw);
        assert!(content.contains("30 0 0 40 10 20 cm"));
        assert!(content.trim_end().ends_with("Q"));
    }

    #[test]
    fn test_base_font_name_strips_delimiters() {
        assert_eq!(base_font_name("My Font (Bold)/x"), "MyFontBoldx");
        assert_eq!(base_font_name("Serif-Regular"), "Serif-Regular");
    }
}
