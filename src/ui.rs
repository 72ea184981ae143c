use anyhow::Result;
use benefits_console::entities::{BenefitPlan, MedicarePlan, PlanOption, RateOwner, RateRecord, Repository};
use benefits_console::lifecycle::{flat_rate_list, group_rates, HistoryView, RateStatus, SortOrder};
use benefits_console::rate_form::{rates_for, LabeledRate};
use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::collections::HashMap;
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    PlanOptions,
    MedicarePlans,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::PlanOptions => Page::MedicarePlans,
            Page::MedicarePlans => Page::PlanOptions,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::PlanOptions => "Plan Options",
            Page::MedicarePlans => "Medicare Plans",
        }
    }

    pub fn view(&self) -> HistoryView {
        match self {
            Page::PlanOptions => HistoryView::Combined,
            Page::MedicarePlans => HistoryView::FlatList,
        }
    }
}

/// Something that has a rate history, with the records already loaded.
#[derive(Debug, Clone)]
pub struct RateOwnerView {
    pub title: String,
    pub records: Vec<RateRecord>,
}

pub struct App {
    pub options: Vec<RateOwnerView>,
    pub medicare: Vec<RateOwnerView>,
    pub state: TableState,
    pub current_page: Page,
    pub order_override: Option<SortOrder>,
    pub today: NaiveDate,
}

impl App {
    pub fn new(options: Vec<RateOwnerView>, medicare: Vec<RateOwnerView>, today: NaiveDate) -> Self {
        let mut app = Self {
            options,
            medicare,
            state: TableState::default(),
            current_page: Page::PlanOptions,
            order_override: None,
            today,
        };
        app.reset_selection();
        app
    }

    /// Read every plan option and Medicare plan with its rates.
    pub fn load(repo: &Repository<'_>, today: NaiveDate) -> Result<Self> {
        let plans: HashMap<i64, String> = repo
            .list::<BenefitPlan>()?
            .into_iter()
            .filter_map(|p| p.id.map(|id| (id, p.name)))
            .collect();

        let mut options = Vec::new();
        for option in repo.list::<PlanOption>()? {
            let Some(id) = option.id else { continue };
            let plan = plans.get(&option.plan_id).map(String::as_str).unwrap_or("?");
            options.push(RateOwnerView {
                title: format!("{} / {}", plan, option.label),
                records: rates_for(repo, RateOwner::PlanOption, id)?,
            });
        }

        let mut medicare = Vec::new();
        for plan in repo.list::<MedicarePlan>()? {
            let Some(id) = plan.id else { continue };
            medicare.push(RateOwnerView {
                title: plan.name,
                records: rates_for(repo, RateOwner::MedicarePlan, id)?,
            });
        }

        tracing::debug!(options = options.len(), medicare = medicare.len(), "loaded rate owners");
        Ok(Self::new(options, medicare, today))
    }

    pub fn owners(&self) -> &[RateOwnerView] {
        match self.current_page {
            Page::PlanOptions => &self.options,
            Page::MedicarePlans => &self.medicare,
        }
    }

    pub fn selected_owner(&self) -> Option<&RateOwnerView> {
        self.state.selected().and_then(|i| self.owners().get(i))
    }

    pub fn order(&self) -> SortOrder {
        self.order_override
            .unwrap_or_else(|| self.current_page.view().default_order())
    }

    pub fn toggle_order(&mut self) {
        self.order_override = Some(match self.order() {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        });
    }

    /// Rates of the selected owner, in display order for the current page.
    /// The grouped view lists planned, then current, then ended.
    pub fn history_rows(&self) -> Vec<LabeledRate> {
        let Some(owner) = self.selected_owner() else {
            return Vec::new();
        };
        let view = self.current_page.view();
        let labeled = owner
            .records
            .iter()
            .cloned()
            .map(|r| LabeledRate::new(r, self.today, view));

        match view {
            HistoryView::Combined => {
                let buckets = group_rates(labeled, self.today, self.order());
                buckets
                    .planned
                    .into_iter()
                    .chain(buckets.current)
                    .chain(buckets.ended)
                    .collect()
            }
            HistoryView::FlatList => flat_rate_list(labeled, self.today, self.order())
                .into_iter()
                .map(|(rate, _)| rate)
                .collect(),
        }
    }

    fn reset_selection(&mut self) {
        let select = if self.owners().is_empty() { None } else { Some(0) };
        self.state.select(select);
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.order_override = None;
        self.reset_selection();
    }

    pub fn next(&mut self) {
        let len = self.owners().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.owners().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "terminal browser failed");
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Tab | KeyCode::BackTab => app.next_page(),
                KeyCode::Char('o') => app.toggle_order(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Owners | history
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let content = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[1]);

    render_owners(f, content[0], app);
    render_history(f, content[1], app);
    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in [Page::PlanOptions, Page::MedicarePlans].iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Today: {}", app.today.format("%Y-%m-%d")),
        Style::default().fg(Color::White),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_owners(f: &mut Frame, area: Rect, app: &mut App) {
    let today = app.today;
    let rows: Vec<Row> = app
        .owners()
        .iter()
        .map(|owner| {
            let current = owner
                .records
                .iter()
                .filter(|r| classify_record(r, today) == RateStatus::Current)
                .max_by_key(|r| r.start_date)
                .map(|r| format!("{:.2}", r.rate))
                .unwrap_or_else(|| "-".to_string());
            Row::new(vec![Cell::from(truncate(&owner.title, 36)), Cell::from(current)])
        })
        .collect();

    let header = Row::new(["Name", "Current"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().bg(Color::DarkGray));

    let table = Table::new(rows, [Constraint::Min(20), Constraint::Length(10)])
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {} ", app.current_page.title())),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn classify_record(record: &RateRecord, today: NaiveDate) -> RateStatus {
    benefits_console::lifecycle::classify(record.start_date, record.end_date, today)
}

fn status_color(status: RateStatus) -> Color {
    match status {
        RateStatus::Planned => Color::Cyan,
        RateStatus::Current => Color::Green,
        RateStatus::Ended => Color::DarkGray,
    }
}

fn render_history(f: &mut Frame, area: Rect, app: &App) {
    let rows = app.history_rows().into_iter().map(|r| {
        let color = status_color(r.status);
        Row::new(vec![
            Cell::from(r.label).style(Style::default().fg(color)),
            Cell::from(format!("{:.2}", r.record.rate)),
            Cell::from(r.record.start_date.format("%Y-%m-%d").to_string()),
            Cell::from(
                r.record
                    .end_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "open".to_string()),
            ),
        ])
    });

    let header = Row::new(["Status", "Rate", "Start", "End"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    }))
    .style(Style::default().bg(Color::DarkGray));

    let title = app
        .selected_owner()
        .map(|o| format!(" {} ", truncate(&o.title, 40)))
        .unwrap_or_else(|| " No rates ".to_string());

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(title));

    f.render_widget(table, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let order = match app.order() {
        SortOrder::Ascending => "oldest first",
        SortOrder::Descending => "newest first",
    };

    let status_spans = vec![
        Span::styled(
            format!(" Row: {}/{} ", selected, app.owners().len()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("o", Style::default().fg(Color::Yellow)),
        Span::raw(format!(" Order ({}) | ", order)),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::White)));

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn rate(owner: RateOwner, rate: f64, start: &str, end: Option<&str>) -> RateRecord {
        RateRecord {
            id: None,
            owner,
            owner_id: 1,
            rate,
            start_date: d(start),
            end_date: end.map(d),
        }
    }

    fn app() -> App {
        let options = vec![RateOwnerView {
            title: "Gold PPO / Employee Only".to_string(),
            records: vec![
                rate(RateOwner::PlanOption, 10.0, "2023-01-01", Some("2023-12-31")),
                rate(RateOwner::PlanOption, 12.0, "2024-01-01", None),
                rate(RateOwner::PlanOption, 14.0, "2025-01-01", None),
            ],
        }];
        let medicare = vec![
            RateOwnerView {
                title: "Plan G".to_string(),
                records: vec![
                    rate(RateOwner::MedicarePlan, 150.0, "2023-01-01", Some("2023-12-31")),
                    rate(RateOwner::MedicarePlan, 160.0, "2024-01-01", None),
                ],
            },
            RateOwnerView {
                title: "Plan N".to_string(),
                records: vec![],
            },
        ];
        App::new(options, medicare, d("2024-06-01"))
    }

    #[test]
    fn test_grouped_rows_for_options() {
        let app = app();
        let labels: Vec<&str> = app.history_rows().iter().map(|r| r.label).collect();
        assert_eq!(labels, vec!["Pending", "Active", "Ended"]);
    }

    #[test]
    fn test_flat_rows_for_medicare_and_order_toggle() {
        let mut app = app();
        app.next_page();
        assert_eq!(app.order(), SortOrder::Descending);
        let rates: Vec<f64> = app.history_rows().iter().map(|r| r.record.rate).collect();
        assert_eq!(rates, vec![160.0, 150.0]);

        app.toggle_order();
        let rates: Vec<f64> = app.history_rows().iter().map(|r| r.record.rate).collect();
        assert_eq!(rates, vec![150.0, 160.0]);

        app.next_page();
        assert_eq!(app.order(), SortOrder::Ascending);
        assert!(app.order_override.is_none());
    }

    #[test]
    fn test_navigation_wraps() {
        let mut app = app();
        app.next_page();
        app.previous();
        assert_eq!(app.selected_owner().map(|o| o.title.as_str()), Some("Plan N"));
        assert!(app.history_rows().is_empty());
        app.next();
        assert_eq!(app.selected_owner().map(|o| o.title.as_str()), Some("Plan G"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Employee + Family", 10), "Employe...");
    }
}
