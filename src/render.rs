use std::io::Write;

use color_eyre::Result;
use crossterm::{
    cursor::MoveTo,
    queue,
    terminal::{Clear, ClearType},
};
use ratatui::{
    Frame, Terminal,
    backend::Backend,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row as TableRow, Table},
};

use crate::{config::MemoryMode, reconcile::Row, viewport::Viewport};

/// Title, server url and column labels.
const HEADER_ROWS: u16 = 3;
const FOOTER_ROWS: u16 = 1;

const KERNEL_WIDTH: u16 = 38;
const CPU_WIDTH: u16 = 7;
const MEM_WIDTH: u16 = 8;

/// Everything one frame shows.
pub struct View<'a> {
    pub server: &'a str,
    pub rows: &'a [Row],
    pub viewport: &'a Viewport,
    pub memory: MemoryMode,
    /// Outcome of the last shutdown request, if any.
    pub status: Option<&'a str>,
}

/// A presentation of the reconciled rows.
pub trait Renderer {
    /// Rows available for data, or `None` when the whole set is always shown.
    fn body_height(&self) -> Result<Option<usize>>;

    fn render(&mut self, view: &View<'_>) -> Result<()>;
}

/// Interactive viewport drawn through ratatui.
pub struct TuiRenderer<B: Backend> {
    terminal: Terminal<B>,
}

impl<B: Backend> TuiRenderer<B> {
    pub fn new(terminal: Terminal<B>) -> Self {
        Self { terminal }
    }

    #[cfg(test)]
    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }
}

impl<B: Backend> Renderer for TuiRenderer<B>
where
    B::Error: std::error::Error + Send + Sync + 'static,
{
    fn body_height(&self) -> Result<Option<usize>> {
        let size = self.terminal.size()?;
        let [_, body, _] = regions(Rect::new(0, 0, size.width, size.height));
        Ok(Some(body.height as usize))
    }

    fn render(&mut self, view: &View<'_>) -> Result<()> {
        self.terminal.draw(|f| ui(f, view))?;
        Ok(())
    }
}

fn ui(f: &mut Frame, view: &View<'_>) {
    let [header, body, footer] = regions(f.area());
    draw_header(f, header, view);
    draw_body(f, body, view);
    draw_footer(f, footer, view);
}

/// Splits the screen into header, body and footer.
///
/// On short terminals the body keeps one row and the footer its line;
/// the header gives up rows first.
fn regions(area: Rect) -> [Rect; 3] {
    let body_min = area.height.min(1);
    let footer = FOOTER_ROWS.min(area.height - body_min);
    let header = HEADER_ROWS.min(area.height - body_min - footer);
    let body = area.height - header - footer;
    [
        Rect { height: header, ..area },
        Rect {
            y: area.y + header,
            height: body,
            ..area
        },
        Rect {
            y: area.y + header + body,
            height: footer,
            ..area
        },
    ]
}

fn columns() -> [Constraint; 4] {
    [
        Constraint::Length(KERNEL_WIDTH),
        Constraint::Length(CPU_WIDTH),
        Constraint::Length(MEM_WIDTH),
        Constraint::Min(0),
    ]
}

fn draw_header(f: &mut Frame, area: Rect, view: &View<'_>) {
    // A squeezed header drops its bottom lines: labels first, then the url.
    let lines: Vec<Rect> = (0..area.height.min(HEADER_ROWS))
        .map(|i| Rect {
            y: area.y + i,
            height: 1,
            ..area
        })
        .collect();
    let line = |i: usize| lines.get(i).copied().unwrap_or_default();
    let banner = Style::default()
        .fg(Color::Green)
        .add_modifier(Modifier::REVERSED);
    f.render_widget(Paragraph::new("NBTOP").style(banner).centered(), line(0));
    f.render_widget(
        Paragraph::new(view.server).style(banner).centered(),
        line(1),
    );

    let labels = TableRow::new(
        ["Kernel", "CPU %", view.memory.label(), "Name"]
            .into_iter()
            .map(Cell::from),
    )
    .style(Style::default().fg(Color::Magenta));
    f.render_widget(
        Table::new(Vec::<TableRow>::new(), columns()).header(labels),
        line(2),
    );
}

fn draw_body(f: &mut Frame, area: Rect, view: &View<'_>) {
    let window = view.viewport.window();
    let selected = view.viewport.selected();
    let start = window.start;
    let visible = view.rows.get(window).unwrap_or(&[]);
    let rows = visible.iter().enumerate().map(|(i, row)| {
        let style = if Some(start + i) == selected {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default().fg(Color::White)
        };
        TableRow::new(vec![
            Cell::from(row.kernel_id.as_str()),
            Cell::from(row.cpu_cell()),
            Cell::from(row.memory_cell(view.memory)),
            Cell::from(row.display_name.as_str()),
        ])
        .style(style)
    });
    f.render_widget(Table::new(rows, columns()), area);
}

fn draw_footer(f: &mut Frame, area: Rect, view: &View<'_>) {
    let key = Style::default().fg(Color::Magenta);
    let mut spans = vec![Span::styled(" s:", key), Span::raw("[shutdown notebook]")];
    if let Some(status) = view.status {
        spans.push(Span::styled(
            format!("  {status}"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let position = match view.viewport.row_count() {
        0 => "0/0".to_string(),
        count => format!("{}/{count}", view.viewport.cursor_line()),
    };
    let right = [
        Span::styled(format!("{position}  "), Style::default().fg(Color::DarkGray)),
        Span::styled("q:", key),
        Span::raw("[quit] "),
    ];

    let used: usize = spans
        .iter()
        .chain(right.iter())
        .map(|s| s.content.chars().count())
        .sum();
    let spacer = (area.width as usize).saturating_sub(used);
    spans.push(Span::raw(" ".repeat(spacer)));
    spans.extend(right);
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Plain-text table reprinted every tick, for logs and dumb terminals.
pub struct FlatRenderer<W: Write> {
    out: W,
    clear: bool,
}

impl<W: Write> FlatRenderer<W> {
    /// `clear` wipes the screen before each table; off when piping to a file.
    pub fn new(out: W, clear: bool) -> Self {
        Self { out, clear }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for FlatRenderer<W> {
    fn body_height(&self) -> Result<Option<usize>> {
        Ok(None)
    }

    fn render(&mut self, view: &View<'_>) -> Result<()> {
        if self.clear {
            queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        self.out.write_all(flat_table(view).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

fn flat_table(view: &View<'_>) -> String {
    let mut table = format!(
        "{:40}{:6}{:8}{}\n",
        "Kernel",
        "CPU %",
        view.memory.label(),
        "Notebook"
    );
    for row in view.rows {
        table.push_str(&format!(
            "{:40}{:>5}{:>6}   {}\n",
            row.kernel_id,
            row.cpu_cell(),
            row.memory_cell(view.memory),
            row.display_name
        ));
    }
    table
}
