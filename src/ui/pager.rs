//! Full-screen scrollable pager. `q` or Escape returns to the prompt.

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{cursor, execute, queue};
use std::io::{self, Write};

use crate::ui::renderer::wrap_line;

pub fn page(title: &str, text: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let result = run(&mut stdout, title, text);

    execute!(stdout, cursor::Show, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    result
}

fn run(stdout: &mut io::Stdout, title: &str, text: &str) -> io::Result<()> {
    let mut offset: usize = 0;
    loop {
        let (cols, rows) = crossterm::terminal::size()?;
        let width = cols.max(20) as usize;
        let height = rows.saturating_sub(2).max(1) as usize;

        let lines: Vec<String> = text
            .lines()
            .flat_map(|line| wrap_line(line, width))
            .collect();
        let max_offset = lines.len().saturating_sub(height);
        offset = offset.min(max_offset);

        queue!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
        write!(stdout, "── {title} ──")?;
        for (row, line) in lines.iter().skip(offset).take(height).enumerate() {
            queue!(stdout, cursor::MoveTo(0, (row + 1) as u16))?;
            write!(stdout, "{line}")?;
        }
        queue!(stdout, cursor::MoveTo(0, rows.saturating_sub(1)))?;
        write!(
            stdout,
            "({}-{}/{})  ↑/↓ PgUp/PgDn scroll, q/Esc quit",
            offset + 1,
            (offset + height).min(lines.len()),
            lines.len()
        )?;
        stdout.flush()?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Up | KeyCode::Char('k') => offset = offset.saturating_sub(1),
                KeyCode::Down | KeyCode::Char('j') => offset = (offset + 1).min(max_offset),
                KeyCode::PageUp => offset = offset.saturating_sub(height),
                KeyCode::PageDown => offset = (offset + height).min(max_offset),
                KeyCode::Home | KeyCode::Char('g') => offset = 0,
                KeyCode::End | KeyCode::Char('G') => offset = max_offset,
                _ => {}
            }
        }
    }
}
