use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap},
};

use crate::config::SVConfig;
use crate::model::{TABS, TableData, UIData};

pub const CMDLINE_HEIGHT: u16 = 1;
pub const FOOTER_HEIGHT: u16 = 1;
const MAX_COLUMN_WIDTH: usize = 40;
const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(6);

pub struct TableUI {
    title: String,
}

impl TableUI {
    pub fn new(config: &SVConfig) -> Self {
        Self {
            title: format!(" sv - student {} ", config.student_id),
        }
    }

    pub fn draw(&mut self, data: &UIData, frame: &mut Frame) {
        let [tabs_area, body_area, footer_area, cmd_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(FOOTER_HEIGHT),
            Constraint::Length(CMDLINE_HEIGHT),
        ])
        .areas(frame.area());

        self.render_tabs(data, frame, tabs_area);
        match &data.table {
            Some(table) => {
                self.render_table(data, table, frame, body_area);
                frame.render_widget(Line::from(table.footer.as_str()).dark_gray(), footer_area);
            }
            None => self.render_profile(data, frame, body_area),
        }
        self.render_cmdline(data, frame, cmd_area);

        if data.show_popup {
            self.render_popup(&data.popup_message, frame);
        }
    }

    fn render_tabs(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let titles = TABS.iter().map(|t| t.title());
        let tabs = Tabs::new(titles)
            .select(data.tab.index())
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .divider("|");
        frame.render_widget(tabs, area);
    }

    fn render_table(&self, data: &UIData, table: &TableData, frame: &mut Frame, area: Rect) {
        let widths = column_widths(table);
        let header = Row::new(table.headers.iter().map(|h| Cell::from(h.as_str())))
            .style(Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED));
        let rows = table
            .rows
            .iter()
            .map(|r| Row::new(r.iter().map(|c| Cell::from(c.as_str()))));

        let mut block = Block::bordered()
            .title(Line::from(self.title.as_str().bold()).centered())
            .border_set(border::PLAIN);
        if data.loading {
            block = block.title(Line::from(" loading ... ".yellow()).right_aligned());
        }
        if table.rows.is_empty() {
            let text = if data.loading { "Loading ..." } else { "No data" };
            frame.render_widget(Paragraph::new(text).centered().block(block), area);
            return;
        }

        let widget = Table::new(rows, widths)
            .header(header)
            .block(block)
            .column_spacing(2)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .cell_highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
        let mut state = TableState::default()
            .with_selected(Some(table.selected_row))
            .with_selected_column(Some(table.selected_column));
        frame.render_stateful_widget(widget, area, &mut state);
    }

    fn render_profile(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        let label_width = data.profile.iter().map(|(l, _)| l.len()).max().unwrap_or(0);
        let lines: Vec<Line> = data
            .profile
            .iter()
            .map(|(label, value)| {
                Line::from(vec![
                    Span::from(format!("{label:>label_width$}  ")).bold(),
                    Span::from(value.as_str()),
                ])
            })
            .collect();
        let block = Block::bordered()
            .title(Line::from(self.title.as_str().bold()).centered())
            .title_bottom(Line::from(" e: edit name  b: edit birth date  i: change image ").centered());
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_cmdline(&self, data: &UIData, frame: &mut Frame, area: Rect) {
        if data.active_cmdinput {
            let prompt = data.cmd_mode.map(|m| m.prompt()).unwrap_or("");
            let prefix = format!("{prompt}: ");
            let line = Line::from(vec![
                Span::from(prefix.as_str()).cyan(),
                Span::from(data.cmdinput.input.as_str()),
            ]);
            frame.render_widget(line, area);
            let x = area.x + (prefix.chars().count() + data.cmdinput.cursor_pos) as u16;
            frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
            return;
        }
        let line = if data.last_status_message_update.elapsed() < STATUS_MESSAGE_TIMEOUT {
            Line::from(data.status_message.as_str())
        } else {
            Line::from("? for help, q to quit").dark_gray()
        };
        frame.render_widget(line, area);
    }

    fn render_popup(&self, message: &str, frame: &mut Frame) {
        let height = message.lines().count() as u16 + 2;
        let width = message.lines().map(|l| l.chars().count()).max().unwrap_or(0) as u16 + 4;
        let area = centered(frame.area(), width, height);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(message).block(block).wrap(Wrap { trim: false }),
            area,
        );
    }
}

fn column_widths(table: &TableData) -> Vec<Constraint> {
    (0..table.headers.len())
        .map(|idx| {
            let content = table
                .rows
                .iter()
                .filter_map(|r| r.get(idx))
                .chain(std::iter::once(&table.headers[idx]))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0);
            Constraint::Length(content.min(MAX_COLUMN_WIDTH) as u16)
        })
        .collect()
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{Terminal, backend::TestBackend};
    use std::time::Instant;

    fn table() -> TableData {
        TableData {
            headers: vec!["Course ▲".into(), "Assignment".into()],
            rows: vec![
                vec!["Python".into(), "task.pdf".into()],
                vec!["Scratch".into(), "Downloading...".into()],
            ],
            selected_row: 1,
            selected_column: 0,
            footer: "Page 1/1  2 rows  5 per page".into(),
        }
    }

    fn render(data: &UIData) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        let mut ui = TableUI::new(&SVConfig::default());
        terminal.draw(|f| ui.draw(data, f)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|line| line.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn widths_follow_content() {
        let widths = column_widths(&table());
        assert_eq!(widths, vec![Constraint::Length(8), Constraint::Length(14)]);
    }

    #[test]
    fn popup_is_centered_and_clamped() {
        let area = Rect::new(0, 0, 20, 10);
        assert_eq!(centered(area, 10, 4), Rect::new(5, 3, 10, 4));
        assert_eq!(centered(area, 30, 40), area);
    }

    #[test]
    fn draws_table_footer_and_status() {
        let mut data = UIData::empty();
        data.table = Some(table());
        data.status_message = "Saved to /tmp/task.pdf".into();
        data.last_status_message_update = Instant::now();
        let screen = render(&data);
        assert!(screen.contains("Schedule"));
        assert!(screen.contains("Downloading..."));
        assert!(screen.contains("Page 1/1"));
        assert!(screen.contains("Saved to /tmp/task.pdf"));
    }

    #[test]
    fn draws_profile_and_help() {
        let mut data = UIData::empty();
        data.profile = vec![("Name".into(), "Ada".into())];
        data.show_popup = true;
        data.popup_message = "q  quit".into();
        let screen = render(&data);
        assert!(screen.contains("Ada"));
        assert!(screen.contains("i: change image"));
        assert!(screen.contains("q  quit"));
    }
}
