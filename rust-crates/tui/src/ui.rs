use crate::client::AppSnapshot;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use futures::StreamExt;
use generated_abi::{
    MAX_DAILY_REFERRALS,
    PARTICIPANT_TARGET,
    networks::{
        chain_label,
        tx_url,
    },
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use skylines_client::{
    admin::AdminAction,
    config::APP_NAME,
    join::parse_referrer,
    notifications::{
        Toast,
        ToastLevel,
    },
    referral::{
        referral_link,
        referrer_from_link,
    },
    units::{
        format_token_amount,
        format_token_fixed,
        relative_time,
        short_address,
    },
};
use std::io::{
    Stdout,
    stdout,
};
use unicode_width::{
    UnicodeWidthChar,
    UnicodeWidthStr,
};

const MAX_REFERRER_INPUT: usize = 256;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Refresh,
    ApproveAndJoin(String),
    Approve(String),
    Join(String),
    Admin(AdminAction),
}

pub type InputEventReceiver = EventStream;

pub fn input_event_stream() -> InputEventReceiver {
    EventStream::new()
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    match events.next().await {
        Some(event) => event.wrap_err("reading terminal input failed"),
        None => Err(eyre!("terminal input stream closed")),
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum View {
    #[default]
    Dashboard,
    Admin,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
enum Mode {
    #[default]
    Normal,
    EditReferrer,
    ConfirmAdmin(AdminAction),
    QuitModal,
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    view: View,
    referrer_input: String,
    is_admin: bool,
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
}

impl UiState {
    pub fn new(referrer: Option<String>, admin_view: bool) -> Self {
        UiState {
            referrer_input: referrer.unwrap_or_default(),
            view: if admin_view { View::Admin } else { View::Dashboard },
            ..UiState::default()
        }
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    state.terminal = Some(Terminal::new(backend)?);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    state.is_admin = snap.is_admin();
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    match event {
        Event::Resize(_, _) => Some(UserEvent::Redraw),
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(state, key),
        _ => None,
    }
}

fn handle_key(state: &mut UiState, key: KeyEvent) -> Option<UserEvent> {
    // Raw mode swallows SIGINT.
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    match &state.mode {
        Mode::EditReferrer => match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                if let Some(referrer) = referrer_from_link(&state.referrer_input) {
                    state.referrer_input = referrer;
                }
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                state.referrer_input.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                state.referrer_input.clear();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) if !c.is_control() => {
                if state.referrer_input.len() < MAX_REFERRER_INPUT {
                    state.referrer_input.push(c);
                }
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::ConfirmAdmin(action) => {
            let action = *action;
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Admin(action))
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                _ => None,
            }
        }
        Mode::QuitModal => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => handle_normal_key(state, key),
    }
}

fn handle_normal_key(state: &mut UiState, key: KeyEvent) -> Option<UserEvent> {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            return Some(UserEvent::Redraw);
        }
        KeyCode::Tab => {
            state.view = match state.view {
                View::Dashboard => View::Admin,
                View::Admin => View::Dashboard,
            };
            return Some(UserEvent::Redraw);
        }
        KeyCode::Char('r') => return Some(UserEvent::Refresh),
        _ => {}
    }
    match state.view {
        View::Dashboard => match key.code {
            KeyCode::Char('e') | KeyCode::Char('i') => {
                state.mode = Mode::EditReferrer;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => Some(UserEvent::ApproveAndJoin(state.referrer_input.clone())),
            KeyCode::Char('a') => Some(UserEvent::Approve(state.referrer_input.clone())),
            KeyCode::Char('j') => Some(UserEvent::Join(state.referrer_input.clone())),
            _ => None,
        },
        View::Admin if state.is_admin => {
            let action = match key.code {
                KeyCode::Char('s') => AdminAction::SelectWinner,
                KeyCode::Char('p') => AdminAction::CompleteWinnerPayment,
                _ => return None,
            };
            state.mode = Mode::ConfirmAdmin(action);
            Some(UserEvent::Redraw)
        }
        View::Admin => None,
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let toast_height = if snap.toasts.is_empty() {
        0
    } else {
        snap.toasts.len() as u16 + 2
    };
    let winner_height = if snap.contract.has_winner() { 4 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(winner_height),
            Constraint::Min(8),
            Constraint::Length(toast_height),
            Constraint::Length(3),
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    draw_prize_pool(f, chunks[1], snap);
    if winner_height > 0 {
        draw_winner(f, chunks[2], snap);
    }
    match state.view {
        View::Dashboard => draw_dashboard(f, state, chunks[3], snap),
        View::Admin => draw_admin(f, chunks[3], snap),
    }
    if toast_height > 0 {
        draw_toasts(f, chunks[4], &snap.toasts);
    }
    draw_help(f, state, chunks[5]);
    draw_modals(f, state);
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let wallet = snap
        .account
        .as_ref()
        .map(short_address)
        .unwrap_or_else(|| "Not connected".to_string());
    let lottery = if snap.lottery.is_zero() {
        "Not deployed".to_string()
    } else {
        short_address(&snap.lottery)
    };
    let text = format!(
        "{} | Wallet: {} | Lottery: {} | Block: {}",
        chain_label(snap.chain_id),
        wallet,
        lottery,
        snap.contract.latest_block
    );
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title(APP_NAME));
    f.render_widget(widget, area);
}

fn draw_prize_pool(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let ratio = (snap.contract.progress() / 100.0).clamp(0.0, 1.0);
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(format!(
            "Prize Pool: {} USDC",
            snap.contract.prize_pool_display()
        )))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(ratio)
        .label(format!(
            "{} / {} participants",
            snap.contract.total_users, PARTICIPANT_TARGET
        ));
    f.render_widget(gauge, area);
}

fn draw_winner(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines = vec![Line::styled(
        format!(
            "🏆 {} won ${} USDC",
            snap.contract.winner,
            format_token_fixed(snap.contract.prize_amount, 2)
        ),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(event) = &snap.winner_event {
        lines.push(Line::styled(
            tx_url(snap.chain_id, &event.tx_hash),
            Style::default().fg(Color::DarkGray),
        ));
    }
    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Winner Announced"),
    );
    f.render_widget(widget, area);
}

fn draw_dashboard(f: &mut Frame, state: &UiState, area: Rect, snap: &AppSnapshot) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    if snap.has_joined() {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(6), Constraint::Min(3)])
            .split(columns[0]);
        draw_joined(f, rows[0], snap);
        draw_referrals(f, rows[1], snap);
    } else {
        draw_join_form(f, state, columns[0], snap);
    }
    draw_recent(f, columns[1], snap);
}

fn draw_join_form(f: &mut Frame, state: &UiState, area: Rect, snap: &AppSnapshot) {
    let editing = state.mode == Mode::EditReferrer;
    let cursor = if editing { "▏" } else { "" };
    let input_style = if editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let mut lines = vec![Line::styled(
        format!("Referrer: {}{}", state.referrer_input, cursor),
        input_style,
    )];

    if snap.lottery.is_zero() {
        lines.push(Line::styled(
            "Lottery contract not deployed on this network",
            Style::default().fg(Color::Red),
        ));
    } else if snap.account.is_none() {
        lines.push(Line::styled(
            "Connect a wallet with --wallet <name> to join",
            Style::default().fg(Color::DarkGray),
        ));
    } else if let Some(quote) = snap.quote(parse_referrer(&state.referrer_input).ok()) {
        let discount = if quote.discounted {
            " (genesis discount)"
        } else {
            ""
        };
        lines.push(Line::from(format!(
            "Entry fee: {} USDC{}",
            format_token_amount(quote.fee),
            discount
        )));
        lines.push(Line::from(format!(
            "Balance: {} USDC | Allowance: {} USDC",
            format_token_amount(quote.balance),
            format_token_amount(quote.allowance)
        )));
        let (text, color) = if quote.check_balance().is_err() {
            ("Insufficient USDC balance", Color::Red)
        } else if quote.needs_approval {
            ("Approval needed before joining", Color::Yellow)
        } else {
            ("Allowance covers the entry fee", Color::Green)
        };
        lines.push(Line::styled(text, Style::default().fg(color)));
    } else {
        lines.push(Line::styled(
            "Loading balances...",
            Style::default().fg(Color::DarkGray),
        ));
    }
    if let Some(pending) = snap.pending {
        lines.push(Line::styled(
            format!("⏳ {pending} in progress..."),
            Style::default().fg(Color::Yellow),
        ));
    }

    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Join the Lottery"));
    f.render_widget(widget, area);
}

fn draw_joined(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines = vec![Line::from("Share your referral link:")];
    if let Some(account) = snap.account {
        lines.push(Line::styled(
            referral_link(&snap.site_url, account),
            Style::default().fg(Color::Cyan),
        ));
    }
    let today = snap
        .user
        .as_ref()
        .map(|u| u.referrals_today.to_string())
        .unwrap_or_else(|| "0".to_string());
    lines.push(Line::from(format!(
        "{today} referrals today (max {MAX_DAILY_REFERRALS})"
    )));
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("🎉 You're In!"));
    f.render_widget(widget, area);
}

fn draw_referrals(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let items: Vec<ListItem> = if snap.referrals.is_empty() {
        vec![ListItem::new("No referrals yet")]
    } else {
        snap.referrals
            .iter()
            .map(|r| {
                let tx = r
                    .tx_hash
                    .map(|hash| tx_url(snap.chain_id, &hash))
                    .unwrap_or_default();
                ListItem::new(format!("{}  {}", short_address(&r.user), tx))
            })
            .collect()
    };
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("My Referrals ({})", snap.referrals.len())),
    );
    f.render_widget(list, area);
}

fn draw_recent(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let items: Vec<ListItem> = if snap.recent.is_empty() {
        vec![ListItem::new("No participants yet")]
    } else {
        snap.recent
            .iter()
            .map(|p| {
                ListItem::new(Line::from(vec![
                    Span::raw(short_address(&p.user)),
                    Span::styled(
                        format!("  via {}", short_address(&p.referrer)),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::raw(format!("  {}", relative_time(p.joined_at, snap.now))),
                ]))
            })
            .collect()
    };
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Recent Participants"),
    );
    f.render_widget(list, area);
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

fn draw_admin(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let block = Block::default().borders(Borders::ALL).title("Admin Dashboard");
    if !snap.is_admin() {
        let owner = snap
            .admin
            .as_ref()
            .map(|a| a.owner.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let lines = vec![
            Line::styled(
                "Access denied: only the contract owner can manage the lottery.",
                Style::default().fg(Color::Red),
            ),
            Line::from(format!("Owner: {owner}")),
        ];
        f.render_widget(Paragraph::new(lines).block(block), area);
        return;
    }

    let contract = &snap.contract;
    let admin = snap.admin.clone().unwrap_or_default();
    let connected = snap
        .account
        .map(|a| a.to_string())
        .unwrap_or_default();
    let mut lines = vec![
        Line::from(format!("Owner: {}", admin.owner)),
        Line::from(format!("Connected: {connected}")),
        Line::from(format!("Network: {}", chain_label(snap.chain_id))),
        Line::from(""),
        Line::from(format!(
            "Participants: {} / {}",
            contract.total_users, PARTICIPANT_TARGET
        )),
        Line::from(format!(
            "Prize pool: {} USDC",
            contract.prize_pool_display()
        )),
        Line::from(format!("Winner selected: {}", yes_no(contract.winner_selected))),
        Line::from(format!("Sorteo triggered: {}", yes_no(admin.sorteo_triggered))),
        Line::from(format!("Request id: {}", admin.request_id)),
    ];
    if contract.has_winner() {
        lines.push(Line::from(format!("Winner: {}", contract.winner)));
        lines.push(Line::from(format!(
            "Prize: {} USDC",
            contract.prize_amount_display()
        )));
    }
    if let Some(pending) = snap.pending {
        lines.push(Line::styled(
            format!("⏳ {pending} in progress..."),
            Style::default().fg(Color::Yellow),
        ));
    }
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn toast_style(level: ToastLevel) -> (&'static str, Color) {
    match level {
        ToastLevel::Loading => ("⏳", Color::Yellow),
        ToastLevel::Info => ("•", Color::Blue),
        ToastLevel::Success => ("✔", Color::Green),
        ToastLevel::Error => ("✖", Color::Red),
    }
}

fn draw_toasts(f: &mut Frame, area: Rect, toasts: &[Toast]) {
    let width = area.width.saturating_sub(4) as usize;
    let lines: Vec<Line> = toasts
        .iter()
        .map(|toast| {
            let (icon, color) = toast_style(toast.level);
            Line::styled(
                fit_width(&format!("{icon} {}", toast.message), width),
                Style::default().fg(color),
            )
        })
        .collect();
    let widget = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Notifications"));
    f.render_widget(widget, area);
}

fn help_text(state: &UiState) -> &'static str {
    match (&state.mode, state.view) {
        (Mode::EditReferrer, _) => "type address or referral link | Backspace delete | Ctrl+U clear | Enter/Esc done",
        (_, View::Dashboard) => {
            "e edit referrer | Enter approve & join | a approve | j join | r refresh | Tab admin | q quit"
        }
        (_, View::Admin) => {
            "s select winner | p complete payment | r refresh | Tab dashboard | q quit"
        }
    }
}

fn draw_help(f: &mut Frame, state: &UiState, area: Rect) {
    let width = area.width.saturating_sub(2) as usize;
    let help = Paragraph::new(fit_width(help_text(state), width))
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    let (title, text) = match &state.mode {
        Mode::ConfirmAdmin(AdminAction::SelectWinner) => (
            "Confirm Winner Selection",
            "Request random winner selection from the VRF coordinator?\nThis can only be done once. (Y/N)",
        ),
        Mode::ConfirmAdmin(AdminAction::CompleteWinnerPayment) => (
            "Confirm Payment",
            "Transfer the prize to the selected winner? (Y/N)",
        ),
        Mode::QuitModal => ("Confirm Quit", "Quit FortuneSkylines? (Y/N)"),
        Mode::Normal | Mode::EditReferrer => return,
    };
    let area = centered_rect(50, 25, f.area());
    let block = Block::default().borders(Borders::ALL).title(title);
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(
        Paragraph::new(text).wrap(Wrap { trim: false }),
        block.inner(area),
    );
}

/// Truncates to `width` terminal columns, marking the cut with an ellipsis.
fn fit_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}
