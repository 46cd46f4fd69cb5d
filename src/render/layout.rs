use crate::analyzer::report::TableBlock;
use crate::render::pdf::{self, A4_HEIGHT, A4_WIDTH, Font, PageCanvas, Rgb};

const MARGIN_LEFT: f32 = 40.0;
const MARGIN_TOP: f32 = 50.0;
const MARGIN_BOTTOM: f32 = 60.0;
const FOOTER_BASELINE_FROM_BOTTOM: f32 = 30.0;

const TITLE_SIZE: f32 = 20.0;
const HEADING_SIZE: f32 = 13.0;
const BODY_SIZE: f32 = 10.0;
const TABLE_SIZE: f32 = 9.0;
const FOOTER_SIZE: f32 = 8.0;

const ROW_HEIGHT: f32 = 20.0;
const CELL_PADDING: f32 = 5.0;

const HEADER_FILL: Rgb = Rgb(41, 128, 185);
const STRIPE_FILL: Rgb = Rgb(245, 245, 245);
const GRID: Rgb = Rgb(210, 210, 210);
const MUTED: Rgb = Rgb(100, 100, 100);

/// Vertical-cursor page layout. Blocks that do not fit on the current page start
/// a new one; tables repeat their header row on every continuation page.
#[derive(Debug)]
pub struct Layout {
    pages: Vec<PageCanvas>,
    cursor: f32,
}

impl Layout {
    pub fn a4() -> Self {
        Self {
            pages: vec![PageCanvas::new(A4_WIDTH, A4_HEIGHT)],
            cursor: MARGIN_TOP,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn into_pages(self) -> Vec<PageCanvas> {
        self.pages
    }

    pub fn title(&mut self, text: &str, subtitle: &str) {
        self.ensure_space(TITLE_SIZE + BODY_SIZE + 16.0);
        self.cursor += TITLE_SIZE;
        let title_baseline = self.cursor;
        let title = pdf::fit_text(text, self.content_width(), TITLE_SIZE);
        self.cursor += BODY_SIZE + 8.0;
        let subtitle_baseline = self.cursor;

        let page = self.page();
        page.text(MARGIN_LEFT, title_baseline, TITLE_SIZE, Font::Bold, Rgb::BLACK, &title);
        page.text(MARGIN_LEFT, subtitle_baseline, BODY_SIZE, Font::Regular, MUTED, subtitle);
        self.cursor += 18.0;
    }

    pub fn heading(&mut self, text: &str) {
        // Keep a heading together with at least one following line.
        self.ensure_space(HEADING_SIZE + 8.0 + ROW_HEIGHT * 2.0);
        self.cursor += HEADING_SIZE;
        let baseline = self.cursor;
        self.page()
            .text(MARGIN_LEFT, baseline, HEADING_SIZE, Font::Bold, Rgb::BLACK, text);
        self.cursor += 8.0;
    }

    pub fn fields(&mut self, fields: &[(String, String)]) {
        let label_width = 130.0;
        let value_width = self.content_width() - label_width;

        for (label, value) in fields {
            self.ensure_space(BODY_SIZE + 6.0);
            self.cursor += BODY_SIZE + 4.0;
            let baseline = self.cursor;
            let value = pdf::fit_text(value, value_width, BODY_SIZE);
            let page = self.page();
            page.text(
                MARGIN_LEFT,
                baseline,
                BODY_SIZE,
                Font::Bold,
                Rgb::BLACK,
                &format!("{label}:"),
            );
            page.text(
                MARGIN_LEFT + label_width,
                baseline,
                BODY_SIZE,
                Font::Regular,
                Rgb::BLACK,
                &value,
            );
        }

        self.cursor += 12.0;
    }

    pub fn table(&mut self, block: &TableBlock) {
        if block.columns.is_empty() {
            return;
        }

        self.ensure_space(ROW_HEIGHT * 2.0);
        self.header_row(&block.columns);

        if block.rows.is_empty() {
            self.ensure_row_space(&block.columns);
            let top = self.cursor;
            let width = self.content_width();
            let message = pdf::fit_text(&block.empty_message, width - CELL_PADDING * 2.0, TABLE_SIZE);
            let page = self.page();
            page.text(
                MARGIN_LEFT + CELL_PADDING,
                top + ROW_HEIGHT - 7.0,
                TABLE_SIZE,
                Font::Regular,
                MUTED,
                &message,
            );
            self.row_rule(top + ROW_HEIGHT);
            self.cursor += ROW_HEIGHT;
        }

        for (index, row) in block.rows.iter().enumerate() {
            self.ensure_row_space(&block.columns);
            let top = self.cursor;
            if index % 2 == 1 {
                let width = self.content_width();
                self.page()
                    .fill_rect(MARGIN_LEFT, top, width, ROW_HEIGHT, STRIPE_FILL);
            }
            self.cells(row, block.columns.len(), top, Font::Regular, Rgb::BLACK);
            self.row_rule(top + ROW_HEIGHT);
            self.cursor += ROW_HEIGHT;
        }

        self.cursor += 16.0;
    }

    /// Post-layout pass: stamps "<footer> - Page i of n" on every page.
    pub fn stamp_footer(&mut self, footer: &str) {
        let total = self.pages.len();

        for (index, page) in self.pages.iter_mut().enumerate() {
            let line = if footer.is_empty() {
                format!("Page {} of {}", index + 1, total)
            } else {
                format!("{} - Page {} of {}", footer, index + 1, total)
            };
            let width = pdf::text_width(&line, FOOTER_SIZE);
            let x = ((page.width() - width) / 2.0).max(MARGIN_LEFT);
            let baseline = page.height() - FOOTER_BASELINE_FROM_BOTTOM;
            page.text(x, baseline, FOOTER_SIZE, Font::Regular, MUTED, &line);
        }
    }

    fn header_row(&mut self, columns: &[String]) {
        let top = self.cursor;
        let width = self.content_width();
        self.page()
            .fill_rect(MARGIN_LEFT, top, width, ROW_HEIGHT, HEADER_FILL);
        self.cells(columns, columns.len(), top, Font::Bold, Rgb::WHITE);
        self.cursor += ROW_HEIGHT;
    }

    fn ensure_row_space(&mut self, columns: &[String]) {
        if self.cursor + ROW_HEIGHT > self.bottom_limit() {
            self.new_page();
            self.header_row(columns);
        }
    }

    fn cells(&mut self, values: &[String], column_count: usize, top: f32, font: Font, color: Rgb) {
        let column_width = self.content_width() / column_count as f32;
        let baseline = top + ROW_HEIGHT - 7.0;
        let page = self.page();

        for (index, value) in values.iter().take(column_count).enumerate() {
            let text = pdf::fit_text(value, column_width - CELL_PADDING * 2.0, TABLE_SIZE);
            let x = MARGIN_LEFT + column_width * index as f32 + CELL_PADDING;
            page.text(x, baseline, TABLE_SIZE, font, color, &text);
        }
    }

    fn row_rule(&mut self, y: f32) {
        let right = MARGIN_LEFT + self.content_width();
        self.page().line((MARGIN_LEFT, y), (right, y), 0.5, GRID);
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.cursor + needed > self.bottom_limit() {
            self.new_page();
        }
    }

    fn new_page(&mut self) {
        self.pages.push(PageCanvas::new(A4_WIDTH, A4_HEIGHT));
        self.cursor = MARGIN_TOP;
    }

    fn content_width(&self) -> f32 {
        A4_WIDTH - MARGIN_LEFT * 2.0
    }

    fn bottom_limit(&self) -> f32 {
        A4_HEIGHT - MARGIN_BOTTOM
    }

    fn page(&mut self) -> &mut PageCanvas {
        if self.pages.is_empty() {
            self.pages.push(PageCanvas::new(A4_WIDTH, A4_HEIGHT));
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: usize) -> TableBlock {
        TableBlock {
            heading: None,
            columns: vec!["Course".to_string(), "Progress".to_string()],
            rows: (0..rows)
                .map(|index| vec![format!("Course {index}"), format!("{}%", index % 101)])
                .collect(),
            empty_message: "No data".to_string(),
        }
    }

    #[test]
    fn short_table_fits_on_one_page() {
        let mut layout = Layout::a4();
        layout.table(&table(10));

        assert_eq!(layout.page_count(), 1);
    }

    #[test]
    fn long_table_paginates() {
        let mut layout = Layout::a4();
        layout.table(&table(120));

        // (841.89 - 50 - 60) / 20 leaves room for 36 rows per page including the header.
        assert_eq!(layout.page_count(), 4);
    }

    #[test]
    fn header_row_repeats_on_every_page() {
        let mut layout = Layout::a4();
        layout.table(&table(80));

        let pages = layout.page_count();
        assert!(pages > 1);
        let bytes = pdf::write_document("Header", layout.into_pages()).expect("pdf written");
        let text = String::from_utf8_lossy(&bytes);

        assert_eq!(text.matches("(Course) Tj").count(), pages);
        assert_eq!(text.matches("(Progress) Tj").count(), pages);
    }

    #[test]
    fn empty_table_still_renders_header_and_message() {
        let mut layout = Layout::a4();
        layout.table(&table(0));

        assert_eq!(layout.page_count(), 1);
        let bytes = pdf::write_document("Empty", layout.into_pages()).expect("pdf written");
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("(No data) Tj"));
        assert!(text.contains("(Course) Tj"));
    }

    #[test]
    fn footer_is_stamped_on_every_page() {
        let mut layout = Layout::a4();
        layout.table(&table(80));
        layout.stamp_footer("Little Learners");

        let pages = layout.page_count();
        let bytes = pdf::write_document("Footer", layout.into_pages()).expect("pdf written");
        let text = String::from_utf8_lossy(&bytes);

        for page in 1..=pages {
            let expected = format!("(Little Learners - Page {page} of {pages}) Tj");
            assert!(text.contains(&expected), "missing footer on page {page}");
        }
    }
}
