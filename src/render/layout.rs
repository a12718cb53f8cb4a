//! Page layout: turns blocks into positioned drawing operations.
//!
//! The cursor runs top-down in points from the top edge; operations are
//! emitted in PDF space with the origin at the bottom left.

use super::{
    BarChart, Block, DocumentContent, FontAsset, FontRole, FontSet, Logo, RenderError, Rgb,
};

pub const PAGE_WIDTH: f32 = 595.28;
pub const PAGE_HEIGHT: f32 = 841.89;

const MARGIN_X: f32 = 50.0;
const CONTENT_TOP: f32 = 80.0;
const CONTENT_BOTTOM: f32 = PAGE_HEIGHT - 80.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN_X;

const CHART_HEIGHT: f32 = 190.0;
const BAR_SPACING: f32 = 12.0;
const CHART_MIN_SCALE: f64 = 5.0;

const LOGO_WIDTH: f32 = 30.0;
const LOGO_MAX_HEIGHT: f32 = 44.0;
const LOGO_TOP: f32 = 16.0;
const WATERMARK_MAX_WIDTH: f32 = 450.0;

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    role: FontRole,
    size: f32,
    leading: f32,
    color: Rgb,
}

const BODY: TextStyle = TextStyle {
    role: FontRole::Body,
    size: 10.0,
    leading: 15.0,
    color: Rgb::TEXT,
};
const TITLE: TextStyle = TextStyle {
    role: FontRole::Heading,
    size: 20.0,
    leading: 26.0,
    color: Rgb(0x2c, 0x3e, 0x50),
};
const HEADING: TextStyle = TextStyle {
    role: FontRole::Heading,
    size: 15.0,
    leading: 20.0,
    color: Rgb(0x34, 0x49, 0x5e),
};
const SUBHEADING: TextStyle = TextStyle {
    role: FontRole::Heading,
    size: 12.0,
    leading: 16.0,
    color: Rgb(0x7f, 0x8c, 0x8d),
};
const QUESTION: TextStyle = TextStyle {
    role: FontRole::Heading,
    size: 10.0,
    leading: 15.0,
    color: Rgb(0x34, 0x49, 0x5e),
};
const ANSWER: TextStyle = TextStyle {
    role: FontRole::Body,
    size: 10.0,
    leading: 15.0,
    color: Rgb::MUTED,
};
const CALLOUT_SIZE: f32 = 18.0;
const CALLOUT_LEADING: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Op {
    Text {
        role: FontRole,
        size: f32,
        x: f32,
        y: f32,
        color: Rgb,
        text: String,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Rgb,
        stroke: Option<Rgb>,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        width: f32,
        color: Rgb,
    },
    /// The document logo scaled into this box. Watermarks are drawn faint.
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        watermark: bool,
    },
}

/// One laid out page. `background` sits under the content, `furniture`
/// holds header, footer and page counter.
#[derive(Debug, Default, Clone)]
pub(crate) struct Page {
    pub background: Vec<Op>,
    pub ops: Vec<Op>,
    pub furniture: Vec<Op>,
}

impl Page {
    pub fn all_ops(&self) -> impl Iterator<Item = &Op> {
        self.background
            .iter()
            .chain(self.ops.iter())
            .chain(self.furniture.iter())
    }
}

/// Fits the logo into `max_width` x `max_height`, keeping its aspect.
fn logo_size(logo: &Logo, max_width: f32, max_height: f32) -> (f32, f32) {
    let height = max_width * logo.aspect();
    if height > max_height {
        (max_height / logo.aspect(), max_height)
    } else {
        (max_width, height)
    }
}

fn watermark(logo: &Logo) -> Op {
    let max_width = (PAGE_WIDTH * 0.7).min(WATERMARK_MAX_WIDTH);
    let (width, height) = logo_size(logo, max_width, CONTENT_BOTTOM - CONTENT_TOP);
    Op::Image {
        x: (PAGE_WIDTH - width) / 2.0,
        y: (PAGE_HEIGHT - height) / 2.0,
        width,
        height,
        watermark: true,
    }
}

/// Greedy word wrap using glyph advances. Words wider than `max_width`
/// are broken between characters. Explicit newlines force a break.
pub(crate) fn wrap(text: &str, font: &FontAsset, size: f32, max_width: f32) -> Vec<String> {
    let space = font.text_width(" ", size);
    let mut lines = Vec::new();

    for source in text.split('\n') {
        let mut line = String::new();
        let mut width = 0.0;

        for word in source.split_whitespace() {
            let word_width = font.text_width(word, size);

            if word_width > max_width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                width = 0.0;
                let mut buf = [0u8; 4];
                for c in word.chars() {
                    let w = font.text_width(c.encode_utf8(&mut buf), size);
                    if width + w > max_width && !line.is_empty() {
                        lines.push(std::mem::take(&mut line));
                        width = 0.0;
                    }
                    line.push(c);
                    width += w;
                }
                continue;
            }

            if line.is_empty() {
                line.push_str(word);
                width = word_width;
            } else if width + space + word_width <= max_width {
                line.push(' ');
                line.push_str(word);
                width += space + word_width;
            } else {
                lines.push(std::mem::take(&mut line));
                line.push_str(word);
                width = word_width;
            }
        }

        if !line.is_empty() {
            lines.push(line);
        }
    }

    lines
}

struct Layout<'a> {
    fonts: &'a FontSet,
    pages: Vec<Page>,
    current: Page,
    cursor: f32,
}

impl<'a> Layout<'a> {
    fn new(fonts: &'a FontSet) -> Self {
        Self {
            fonts,
            pages: Vec::new(),
            current: Page::default(),
            cursor: CONTENT_TOP,
        }
    }

    fn at_page_top(&self) -> bool {
        self.cursor <= CONTENT_TOP
    }

    fn remaining(&self) -> f32 {
        CONTENT_BOTTOM - self.cursor
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.cursor = CONTENT_TOP;
    }

    /// Starts a new page unless `height` still fits on this one.
    fn ensure(&mut self, height: f32) {
        if self.remaining() < height && !self.at_page_top() {
            self.new_page();
        }
    }

    fn space(&mut self, height: f32) {
        if !self.at_page_top() {
            self.cursor = (self.cursor + height).min(CONTENT_BOTTOM);
        }
    }

    fn wrap(&self, text: &str, style: TextStyle) -> Vec<String> {
        wrap(text, self.fonts.get(style.role), style.size, CONTENT_WIDTH)
    }

    fn place_line(&mut self, text: &str, style: TextStyle, align: Align) {
        let font = self.fonts.get(style.role);
        let width = font.text_width(text, style.size);
        let x = match align {
            Align::Left => MARGIN_X,
            Align::Center => (PAGE_WIDTH - width) / 2.0,
            Align::Right => PAGE_WIDTH - MARGIN_X - width,
        };
        let ascent = font.ascender() / 1000.0 * style.size;
        let baseline = self.cursor + (style.leading - style.size) / 2.0 + ascent;
        self.current.ops.push(Op::Text {
            role: style.role,
            size: style.size,
            x,
            y: PAGE_HEIGHT - baseline,
            color: style.color,
            text: text.to_string(),
        });
        self.cursor += style.leading;
    }

    fn flow_lines(&mut self, lines: &[String], style: TextStyle) {
        for line in lines {
            self.ensure(style.leading);
            self.place_line(line, style, Align::Left);
        }
    }

    fn rule(&mut self, width: f32, color: Rgb) {
        let y = PAGE_HEIGHT - self.cursor;
        self.current.ops.push(Op::Line {
            from: (MARGIN_X, y),
            to: (PAGE_WIDTH - MARGIN_X, y),
            width,
            color,
        });
    }

    /// Height the next block needs on the same page as a preceding heading.
    fn first_line_height(&self, next: Option<&Block>) -> f32 {
        match next {
            None => 0.0,
            Some(Block::Title(_)) => TITLE.leading,
            Some(Block::Heading(_)) => HEADING.leading,
            Some(Block::Subheading(_)) => SUBHEADING.leading,
            Some(Block::Paragraph(_)) => BODY.leading,
            Some(Block::QuestionAnswer { .. }) => QUESTION.leading + ANSWER.leading,
            Some(Block::Chart(_)) => CHART_HEIGHT,
            Some(Block::Callout { .. }) => CALLOUT_LEADING,
        }
    }

    fn heading(&mut self, text: &str, style: TextStyle, before: f32, after: f32, next: Option<&Block>) {
        self.space(before);
        let lines = self.wrap(text, style);
        let height = lines.len() as f32 * style.leading + after;
        self.ensure(height + self.first_line_height(next));
        for line in &lines {
            self.place_line(line, style, Align::Left);
        }
    }

    fn block(&mut self, block: &Block, next: Option<&Block>) -> Result<(), RenderError> {
        match block {
            Block::Title(text) => {
                let lines = self.wrap(text, TITLE);
                let height = lines.len() as f32 * TITLE.leading + 14.0;
                self.ensure(height + self.first_line_height(next));
                for line in &lines {
                    self.place_line(line, TITLE, Align::Center);
                }
                self.cursor += 4.0;
                self.rule(2.0, Rgb::NAVY);
                self.cursor += 10.0;
            }
            Block::Heading(text) => {
                self.heading(text, HEADING, 18.0, 10.0, next);
                self.cursor += 3.0;
                self.rule(0.75, Rgb(0xbd, 0xc3, 0xc7));
                self.cursor += 7.0;
            }
            Block::Subheading(text) => {
                self.heading(text, SUBHEADING, 8.0, 4.0, next);
                self.cursor += 4.0;
            }
            Block::Paragraph(text) => {
                let lines = self.wrap(text, BODY);
                self.flow_lines(&lines, BODY);
                self.space(6.0);
            }
            Block::QuestionAnswer { question, answer } => {
                let question = self.wrap(question, QUESTION);
                let answer = self.wrap(answer, ANSWER);
                self.ensure(question.len() as f32 * QUESTION.leading + ANSWER.leading);
                self.flow_lines(&question, QUESTION);
                self.flow_lines(&answer, ANSWER);
                self.space(10.0);
            }
            Block::Callout { text, color } => {
                let style = TextStyle {
                    role: FontRole::Heading,
                    size: CALLOUT_SIZE,
                    leading: CALLOUT_LEADING,
                    color: *color,
                };
                let lines = self.wrap(text, style);
                self.ensure(lines.len() as f32 * style.leading);
                self.flow_lines(&lines, style);
                self.space(6.0);
            }
            Block::Chart(chart) => {
                self.ensure(CHART_HEIGHT);
                self.chart(chart)?;
                self.cursor += CHART_HEIGHT;
                self.space(12.0);
            }
        }
        Ok(())
    }

    fn text_at(&mut self, text: &str, style: TextStyle, x: f32, top: f32, align: Align) {
        let width = self.fonts.get(style.role).text_width(text, style.size);
        let x = match align {
            Align::Left => x,
            Align::Center => x - width / 2.0,
            Align::Right => x - width,
        };
        self.current.ops.push(Op::Text {
            role: style.role,
            size: style.size,
            x,
            y: PAGE_HEIGHT - top,
            color: style.color,
            text: text.to_string(),
        });
    }

    fn chart(&mut self, chart: &BarChart) -> Result<(), RenderError> {
        if let Some(bar) = chart.bars.iter().find(|b| !b.value.is_finite()) {
            return Err(RenderError::Layout(format!(
                "chart {:?} has a non-finite value for {:?}",
                chart.title, bar.label
            )));
        }

        let top = self.cursor;
        self.current.ops.push(Op::Rect {
            x: MARGIN_X,
            y: PAGE_HEIGHT - top - CHART_HEIGHT,
            width: CONTENT_WIDTH,
            height: CHART_HEIGHT,
            fill: Rgb(0xfc, 0xfc, 0xfc),
            stroke: Some(Rgb(0xee, 0xee, 0xee)),
        });

        let caption = TextStyle { size: 11.0, ..BODY };
        self.text_at(&chart.title, caption, PAGE_WIDTH / 2.0, top + 20.0, Align::Center);

        let plot_top = top + 38.0;
        let plot_bottom = top + CHART_HEIGHT - 34.0;
        let plot_left = MARGIN_X + 44.0;
        let plot_right = PAGE_WIDTH - MARGIN_X - 16.0;
        let plot_height = plot_bottom - plot_top;

        let scale = chart
            .bars
            .iter()
            .map(|b| b.value.abs())
            .fold(CHART_MIN_SCALE, f64::max);

        let (baseline, span) = if chart.signed {
            (plot_top + plot_height / 2.0, plot_height / 2.0)
        } else {
            (plot_bottom, plot_height)
        };

        let axis = Rgb(0xcc, 0xcc, 0xcc);
        self.current.ops.push(Op::Line {
            from: (plot_left, PAGE_HEIGHT - baseline),
            to: (plot_right, PAGE_HEIGHT - baseline),
            width: 1.0,
            color: axis,
        });

        let tick_style = TextStyle {
            size: 8.0,
            color: Rgb::MUTED,
            ..BODY
        };
        let ticks: Vec<(f64, String)> = if chart.signed {
            vec![
                (scale, format!("+{scale:.0}%")),
                (0.0, "0%".to_string()),
                (-scale, format!("-{scale:.0}%")),
            ]
        } else {
            vec![
                (scale, format!("{scale:.0}%")),
                (scale / 2.0, format!("{:.0}%", scale / 2.0)),
                (0.0, "0%".to_string()),
            ]
        };
        for (value, label) in ticks {
            let at = baseline - (value / scale) as f32 * span;
            self.current.ops.push(Op::Line {
                from: (plot_left, PAGE_HEIGHT - at),
                to: (plot_left + 5.0, PAGE_HEIGHT - at),
                width: 0.5,
                color: axis,
            });
            self.text_at(&label, tick_style, plot_left - 6.0, at + 3.0, Align::Right);
        }

        let count = chart.bars.len();
        if count == 0 {
            return Ok(());
        }
        let bar_width =
            ((plot_right - plot_left - 10.0) - (count - 1) as f32 * BAR_SPACING) / count as f32;
        let value_style = TextStyle {
            role: FontRole::Heading,
            size: 8.0,
            ..BODY
        };
        let label_style = TextStyle {
            size: 8.0,
            color: Rgb::MUTED,
            ..BODY
        };

        for (i, bar) in chart.bars.iter().enumerate() {
            let x = plot_left + 10.0 + i as f32 * (bar_width + BAR_SPACING);
            let height = (bar.value.abs() / scale) as f32 * span;
            let (bar_top, bar_bottom) = if bar.value >= 0.0 {
                (baseline - height, baseline)
            } else {
                (baseline, baseline + height)
            };
            if height > 0.0 {
                self.current.ops.push(Op::Rect {
                    x,
                    y: PAGE_HEIGHT - bar_bottom,
                    width: bar_width,
                    height,
                    fill: bar.color,
                    stroke: None,
                });
            }

            let center = x + bar_width / 2.0;
            let (value_text, value_top) = if chart.signed {
                let top = if bar.value >= 0.0 {
                    bar_top - 3.0
                } else {
                    bar_bottom + 9.0
                };
                (format!("{:+.1}%", bar.value), top)
            } else {
                (format!("{:.1}%", bar.value), bar_top - 3.0)
            };
            self.text_at(&value_text, value_style, center, value_top, Align::Center);
            self.text_at(&bar.label, label_style, center, plot_bottom + 22.0, Align::Center);
        }

        Ok(())
    }

    fn finish(mut self, content: &DocumentContent, logo: Option<&Logo>) -> Vec<Page> {
        if !self.current.ops.is_empty() || self.pages.is_empty() {
            self.pages.push(std::mem::take(&mut self.current));
        }

        let total = self.pages.len();
        let fonts = self.fonts;
        for (i, page) in self.pages.iter_mut().enumerate() {
            page.background = logo.map(watermark).into_iter().collect();
            page.furniture = furniture(fonts, content, logo, i + 1, total);
        }
        self.pages
    }
}

fn push_text(
    ops: &mut Vec<Op>,
    role: FontRole,
    size: f32,
    color: Rgb,
    x: f32,
    baseline: f32,
    text: String,
) {
    ops.push(Op::Text {
        role,
        size,
        x,
        y: baseline,
        color,
        text,
    });
}

fn centered(ops: &mut Vec<Op>, font: &FontAsset, role: FontRole, size: f32, top: f32, text: String) {
    let x = (PAGE_WIDTH - font.text_width(&text, size)) / 2.0;
    push_text(ops, role, size, Rgb::MUTED, x, PAGE_HEIGHT - top, text);
}

fn furniture(
    fonts: &FontSet,
    content: &DocumentContent,
    logo: Option<&Logo>,
    page: usize,
    total: usize,
) -> Vec<Op> {
    let mut ops = Vec::new();
    let heading = fonts.get(FontRole::Heading);
    let body = fonts.get(FontRole::Body);

    if let Some(logo) = logo {
        let (width, height) = logo_size(logo, LOGO_WIDTH, LOGO_MAX_HEIGHT);
        ops.push(Op::Image {
            x: MARGIN_X,
            y: PAGE_HEIGHT - LOGO_TOP - height,
            width,
            height,
            watermark: false,
        });
    }

    if let Some(badge) = &content.badge {
        let label = format!("{} ", badge.label);
        let value_x = PAGE_WIDTH - MARGIN_X - heading.text_width(&badge.value, 12.0);
        let label_x = value_x - heading.text_width(&label, 12.0);
        let baseline = PAGE_HEIGHT - 48.0;
        push_text(&mut ops, FontRole::Heading, 12.0, Rgb::NAVY, label_x, baseline, label);
        push_text(
            &mut ops,
            FontRole::Heading,
            12.0,
            badge.color,
            value_x,
            baseline,
            badge.value.clone(),
        );
    }

    let footer_top = PAGE_HEIGHT - 62.0;
    let inset = CONTENT_WIDTH * 0.05;
    ops.push(Op::Line {
        from: (MARGIN_X + inset, PAGE_HEIGHT - footer_top),
        to: (PAGE_WIDTH - MARGIN_X - inset, PAGE_HEIGHT - footer_top),
        width: 0.5,
        color: Rgb(0xcc, 0xcc, 0xcc),
    });

    // First footer line is the organisation name, the rest share one line.
    let mut top = footer_top + 11.0;
    if let Some((first, rest)) = content.footer.split_first() {
        for line in wrap(first, heading, 8.0, CONTENT_WIDTH) {
            centered(&mut ops, heading, FontRole::Heading, 8.0, top, line);
            top += 10.0;
        }
        let contact = rest.join(" - ");
        for line in wrap(&contact, body, 7.0, CONTENT_WIDTH) {
            centered(&mut ops, body, FontRole::Body, 7.0, top, line);
            top += 9.0;
        }
    }

    let counter = format!("{} {page} / {total}", content.page_label);
    let x = PAGE_WIDTH - MARGIN_X - body.text_width(&counter, 8.0);
    push_text(&mut ops, FontRole::Body, 8.0, Rgb::MUTED, x, 24.0, counter);

    ops
}

pub(crate) fn layout(
    content: &DocumentContent,
    fonts: &FontSet,
    logo: Option<&Logo>,
) -> Result<Vec<Page>, RenderError> {
    let mut layout = Layout::new(fonts);
    for (i, block) in content.blocks.iter().enumerate() {
        layout.block(block, content.blocks.get(i + 1))?;
    }
    Ok(layout.finish(content, logo))
}
