use anyhow::Result;
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
use rusqlite::Connection;
use std::io;

use crate::db::{list_open_tickets, list_spots};
use crate::model::{ParkingSpot, ParkingType, Ticket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Spots,
    OpenTickets,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Spots => Page::OpenTickets,
            Page::OpenTickets => Page::Spots,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Spots => "Spots",
            Page::OpenTickets => "Open Tickets",
        }
    }
}

pub struct App {
    pub spots: Vec<ParkingSpot>,
    pub open_tickets: Vec<Ticket>,
    pub current_page: Page,
    pub spots_state: TableState,
    pub tickets_state: TableState,
}

impl App {
    pub fn new(spots: Vec<ParkingSpot>, open_tickets: Vec<Ticket>) -> Self {
        let mut app = Self {
            spots,
            open_tickets,
            current_page: Page::Spots,
            spots_state: TableState::default(),
            tickets_state: TableState::default(),
        };
        app.reset_selection();
        app
    }

    pub fn load(conn: &Connection) -> crate::Result<Self> {
        Ok(Self::new(list_spots(conn)?, list_open_tickets(conn)?))
    }

    /// Re-read spots and tickets, e.g. after the desk processed a vehicle
    pub fn reload(&mut self, conn: &Connection) -> crate::Result<()> {
        self.spots = list_spots(conn)?;
        self.open_tickets = list_open_tickets(conn)?;
        self.reset_selection();
        Ok(())
    }

    fn reset_selection(&mut self) {
        self.spots_state
            .select(if self.spots.is_empty() { None } else { Some(0) });
        self.tickets_state
            .select(if self.open_tickets.is_empty() { None } else { Some(0) });
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    fn active(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::Spots => (&mut self.spots_state, self.spots.len()),
            Page::OpenTickets => (&mut self.tickets_state, self.open_tickets.len()),
        }
    }

    pub fn next(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (state, len) = self.active();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    /// (free, total) spots of a type
    pub fn occupancy(&self, parking_type: ParkingType) -> (usize, usize) {
        let of_type = self.spots.iter().filter(|s| s.parking_type == parking_type);
        let total = of_type.clone().count();
        let free = of_type.filter(|s| s.available).count();
        (free, total)
    }
}

pub fn run_ui(app: &mut App, conn: &Connection) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app, conn);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    conn: &Connection,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Tab | KeyCode::BackTab => app.next_page(),
                KeyCode::Char('r') => app.reload(conn)?,
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
            Constraint::Length(3), // Header with occupancy
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Key help
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Spots => render_spots(f, chunks[1], app),
        Page::OpenTickets => render_tickets(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2]);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![];
    for (i, page) in [Page::Spots, Page::OpenTickets].iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" │ "));
        }
        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(page.title().to_string(), style));
    }

    for parking_type in ParkingType::ALL {
        let (free, total) = app.occupancy(parking_type);
        let color = if free == 0 { Color::Red } else { Color::Green };
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("{} {}/{} free", parking_type, free, total),
            Style::default().fg(color),
        ));
    }

    let header = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_spots(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.spots.iter().map(|spot| {
        let (status, color) = if spot.available {
            ("free", Color::Green)
        } else {
            ("occupied", Color::Red)
        };
        let occupant = app
            .open_tickets
            .iter()
            .find(|t| t.spot_number == spot.number)
            .map(|t| t.vehicle_reg.clone())
            .unwrap_or_default();

        Row::new(vec![
            Cell::from(spot.number.to_string()),
            Cell::from(spot.parking_type.as_str()),
            Cell::from(status).style(Style::default().fg(color)),
            Cell::from(occupant),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(16),
        ],
    )
    .header(header_row(&["Spot", "Type", "Status", "Vehicle"]))
    .block(Block::default().borders(Borders::ALL).title(" Spots "))
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.spots_state);
}

fn render_tickets(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.open_tickets.iter().map(|ticket| {
        Row::new(vec![
            Cell::from(ticket.id.map(|id| id.to_string()).unwrap_or_default()),
            Cell::from(ticket.vehicle_reg.clone()),
            Cell::from(ticket.spot_number.to_string()),
            Cell::from(ticket.parking_type.as_str()),
            Cell::from(ticket.in_time.format("%Y-%m-%d %H:%M").to_string()),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(16),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(18),
        ],
    )
    .header(header_row(&["Ticket", "Vehicle", "Spot", "Type", "Since"]))
    .block(Block::default().borders(Borders::ALL).title(" Open Tickets "))
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.tickets_state);
}

fn render_status_bar(f: &mut Frame, area: Rect) {
    let spans = vec![
        Span::styled(" Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" Reload | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}
