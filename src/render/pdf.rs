//! Minimal PDF 1.4 writer: base-14 Helvetica text, filled rectangles, lines and
//! uncompressed RGB image XObjects. Coordinates passed to [`PageCanvas`] use a
//! top-left origin; conversion to PDF user space happens here.

use anyhow::{Result, bail};
use std::fmt::Write as _;

pub const A4_WIDTH: f32 = 595.28;
pub const A4_HEIGHT: f32 = 841.89;

const PRODUCER: &str = "littlelearners";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    fn operands(self) -> String {
        format!(
            "{:.3} {:.3} {:.3}",
            f32::from(self.0) / 255.0,
            f32::from(self.1) / 255.0,
            f32::from(self.2) / 255.0
        )
    }
}

/// 8-bit RGB pixels, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PageCanvas {
    width: f32,
    height: f32,
    content: Vec<u8>,
    image: Option<RasterImage>,
}

impl PageCanvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            content: Vec::new(),
            image: None,
        }
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    /// `baseline` is measured from the top edge of the page.
    pub fn text(&mut self, x: f32, baseline: f32, size: f32, font: Font, color: Rgb, text: &str) {
        self.operator(format!(
            "BT /{} {:.1} Tf {} rg {:.2} {:.2} Td (",
            font.resource_name(),
            size,
            color.operands(),
            x,
            self.height - baseline
        ));
        self.content.extend(escape_text(text));
        self.content.extend_from_slice(b") Tj ET\n");
    }

    pub fn fill_rect(&mut self, x: f32, top: f32, width: f32, height: f32, color: Rgb) {
        self.operator(format!(
            "{} rg {:.2} {:.2} {:.2} {:.2} re f\n",
            color.operands(),
            x,
            self.height - top - height,
            width,
            height
        ));
    }

    pub fn line(&mut self, from: (f32, f32), to: (f32, f32), stroke_width: f32, color: Rgb) {
        self.operator(format!(
            "{} RG {:.2} w {:.2} {:.2} m {:.2} {:.2} l S\n",
            color.operands(),
            stroke_width,
            from.0,
            self.height - from.1,
            to.0,
            self.height - to.1
        ));
    }

    /// Stretches the raster over the whole page.
    pub fn draw_image(&mut self, image: RasterImage) {
        self.operator(format!(
            "q {:.2} 0 0 {:.2} 0 0 cm /Im1 Do Q\n",
            self.width, self.height
        ));
        self.image = Some(image);
    }

    fn operator(&mut self, operator: String) {
        self.content.extend(operator.into_bytes());
    }
}

pub fn write_document(title: &str, pages: Vec<PageCanvas>) -> Result<Vec<u8>> {
    if pages.is_empty() {
        bail!("Cannot write a PDF without pages");
    }

    // Slots 1..=5 are fixed: catalog, page tree, two fonts, info.
    let mut objects: Vec<Vec<u8>> = vec![Vec::new(); 5];
    let mut kids = Vec::with_capacity(pages.len());

    for page in pages {
        let content_id = push(&mut objects, stream_object("", &page.content));

        let xobjects = match page.image {
            Some(image) => {
                let expected = image.width as usize * image.height as usize * 3;
                if image.width == 0 || image.height == 0 || image.pixels.len() != expected {
                    bail!(
                        "Invalid raster image: {}x{} with {} bytes",
                        image.width,
                        image.height,
                        image.pixels.len()
                    );
                }
                let dictionary = format!(
                    "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB /BitsPerComponent 8",
                    image.width, image.height
                );
                let image_id = push(&mut objects, stream_object(&dictionary, &image.pixels));
                format!(" /XObject << /Im1 {image_id} 0 R >>")
            }
            None => String::new(),
        };

        let page_id = push(
            &mut objects,
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] /Resources << /Font << /F1 3 0 R /F2 4 0 R >>{} >> /Contents {} 0 R >>",
                page.width, page.height, xobjects, content_id
            )
            .into_bytes(),
        );
        kids.push(page_id);
    }

    let kid_refs = kids
        .iter()
        .map(|id| format!("{id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");

    objects[0] = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();
    objects[1] = format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kid_refs,
        kids.len()
    )
    .into_bytes();
    objects[2] = font_object("Helvetica");
    objects[3] = font_object("Helvetica-Bold");
    let mut info = b"<< /Title (".to_vec();
    info.extend(escape_text(title));
    info.extend(format!(") /Producer ({PRODUCER}) >>").into_bytes());
    objects[4] = info;

    Ok(serialize(&objects))
}

/// Rough Helvetica advance width, good enough for truncation and centering.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().map(advance).sum::<f32>() * size
}

/// Shortens `text` with a trailing ellipsis so that it fits `max_width`.
pub fn fit_text(text: &str, max_width: f32, size: f32) -> String {
    if text_width(text, size) <= max_width {
        return text.to_string();
    }

    let budget = max_width / size - advance('.') * 3.0;
    if budget < 0.0 {
        return String::new();
    }

    let mut used = 0.0;
    let mut cut = 0;
    for (index, ch) in text.char_indices() {
        used += advance(ch);
        if used > budget {
            break;
        }
        cut = index + ch.len_utf8();
    }

    format!("{}...", text[..cut].trim_end())
}

fn advance(ch: char) -> f32 {
    match ch {
        'i' | 'j' | 'l' | '.' | ',' | '\'' | '|' | '!' | ':' | ';' => 0.278,
        'f' | 't' | 'r' | 'I' | ' ' | '-' | '(' | ')' | '/' => 0.333,
        'm' | 'w' | 'M' | 'W' | '%' | '@' => 0.833,
        'A'..='Z' => 0.667,
        _ => 0.556,
    }
}

fn push(objects: &mut Vec<Vec<u8>>, body: Vec<u8>) -> usize {
    objects.push(body);
    objects.len()
}

fn font_object(base_font: &str) -> Vec<u8> {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{base_font} /Encoding /WinAnsiEncoding >>"
    )
    .into_bytes()
}

fn stream_object(dictionary: &str, data: &[u8]) -> Vec<u8> {
    let separator = if dictionary.is_empty() { "" } else { " " };
    let mut body =
        format!("<< {dictionary}{separator}/Length {} >>\nstream\n", data.len()).into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(b"\nendstream");
    body
}

fn serialize(objects: &[Vec<u8>]) -> Vec<u8> {
    let mut output = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());

    for (index, body) in objects.iter().enumerate() {
        offsets.push(output.len());
        output.extend(format!("{} 0 obj\n", index + 1).into_bytes());
        output.extend_from_slice(body);
        output.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = output.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = writeln!(xref, "{offset:010} 00000 n ");
    }
    let _ = write!(
        xref,
        "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    );
    output.extend(xref.into_bytes());

    output
}

/// Escaped WinAnsi bytes; characters outside the encoding become `?`.
fn escape_text(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '\\' | '(' | ')' => {
                bytes.push(b'\\');
                bytes.push(ch as u8);
            }
            '\n' | '\r' | '\t' => bytes.push(b' '),
            '\u{2013}' | '\u{2014}' => bytes.push(b'-'),
            '\u{2018}' | '\u{2019}' => bytes.push(b'\''),
            '\u{201C}' | '\u{201D}' => bytes.push(b'"'),
            '\u{2022}' => bytes.push(0x95),
            '\u{2026}' => bytes.push(0x85),
            ' '..='~' => bytes.push(ch as u8),
            '\u{A0}'..='\u{FF}' => bytes.push(ch as u32 as u8),
            _ => bytes.push(b'?'),
        }
    }

    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).to_string()
    }

    #[test]
    fn writes_header_xref_and_trailer() {
        let mut page = PageCanvas::new(A4_WIDTH, A4_HEIGHT);
        page.text(40.0, 60.0, 12.0, Font::Bold, Rgb::BLACK, "Hello (kids)");

        let bytes = write_document("Test", vec![page]).expect("pdf written");
        let text = as_text(&bytes);

        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("/Type /Pages /Kids [7 0 R] /Count 1"));
        assert!(text.contains("(Hello \\(kids\\)) Tj"));
        assert!(text.contains("/F2 12.0 Tf"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let pages = vec![
            PageCanvas::new(A4_WIDTH, A4_HEIGHT),
            PageCanvas::new(A4_WIDTH, A4_HEIGHT),
        ];
        let bytes = write_document("Offsets", pages).expect("pdf written");

        let xref_start = bytes
            .windows(5)
            .position(|window| window == b"xref\n")
            .expect("xref present");
        let table = String::from_utf8(bytes[xref_start..].to_vec()).expect("ascii xref");
        let entries = table
            .lines()
            .skip(3)
            .take_while(|line| line.ends_with(" n "))
            .collect::<Vec<_>>();

        assert_eq!(entries.len(), 9);
        for (index, entry) in entries.iter().enumerate() {
            let offset = entry[..10].parse::<usize>().expect("numeric offset");
            let expected = format!("{} 0 obj", index + 1);
            assert!(
                bytes[offset..].starts_with(expected.as_bytes()),
                "object {}",
                index + 1
            );
        }
    }

    #[test]
    fn text_is_converted_to_top_left_coordinates() {
        let mut page = PageCanvas::new(200.0, 100.0);
        page.text(10.0, 30.0, 10.0, Font::Regular, Rgb::BLACK, "x");
        page.fill_rect(0.0, 0.0, 50.0, 20.0, Rgb::WHITE);

        let bytes = write_document("Coords", vec![page]).expect("pdf written");
        let text = as_text(&bytes);

        assert!(text.contains("10.00 70.00 Td"));
        assert!(text.contains("0.00 80.00 50.00 20.00 re f"));
    }

    #[test]
    fn embeds_rgb_image_xobject() {
        let mut page = PageCanvas::new(2.0, 1.0);
        page.draw_image(RasterImage {
            width: 2,
            height: 1,
            pixels: vec![255, 0, 0, 0, 0, 255],
        });

        let bytes = write_document("Image", vec![page]).expect("pdf written");
        let text = as_text(&bytes);

        assert!(text.contains("/Subtype /Image /Width 2 /Height 1"));
        assert!(text.contains("/XObject << /Im1"));
        assert!(text.contains("/Im1 Do"));
    }

    #[test]
    fn rejects_mismatched_raster() {
        let mut page = PageCanvas::new(2.0, 2.0);
        page.draw_image(RasterImage {
            width: 2,
            height: 2,
            pixels: vec![0; 5],
        });

        assert!(write_document("Broken", vec![page]).is_err());
    }

    #[test]
    fn rejects_empty_page_list() {
        assert!(write_document("Empty", Vec::new()).is_err());
    }

    #[test]
    fn non_latin_text_is_replaced() {
        assert_eq!(escape_text("Caf\u{e9} \u{1F600}"), b"Caf\xE9 ?".to_vec());
        assert_eq!(escape_text("a\u{2014}b"), b"a-b".to_vec());
    }

    #[test]
    fn fit_text_truncates_with_ellipsis() {
        let long = "Phonics and Reading Adventures for Young Learners";
        let fitted = fit_text(long, 80.0, 9.0);

        assert!(fitted.ends_with("..."));
        assert!(text_width(&fitted, 9.0) <= 80.0);
        assert_eq!(fit_text("Colors", 80.0, 9.0), "Colors");
    }

    #[test]
    fn fit_text_handles_very_long_input() {
        let long = "W".repeat(300_000);
        let fitted = fit_text(&long, 515.28, 20.0);

        assert!(fitted.ends_with("..."));
        assert!(fitted.len() < 40);
        assert_eq!(fit_text("Wide", 1.0, 20.0), "");
    }
}
