use procsim_core::{card::CardTone, timeline::IntervalStyle, ProcessState};
use ratatui::style::{Color, Modifier, Style};

#[derive(Clone, Copy)]
pub struct VizTheme {
    pub bg: Color,
    pub surface: Color,
    pub border: Color,
    pub title: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub ok: Color,
    pub warn: Color,
    pub critical: Color,
    pub info: Color,
}

pub fn viz_theme() -> VizTheme {
    VizTheme {
        bg: Color::Rgb(11, 18, 32),
        surface: Color::Rgb(17, 26, 46),
        border: Color::Rgb(71, 85, 105),
        title: Color::Rgb(191, 219, 254),
        text: Color::Rgb(226, 232, 240),
        muted: Color::Rgb(148, 163, 184),
        accent: Color::Rgb(56, 189, 248),
        ok: Color::Rgb(34, 197, 94),
        warn: Color::Rgb(245, 158, 11),
        critical: Color::Rgb(239, 68, 68),
        info: Color::Rgb(59, 130, 246),
    }
}

impl VizTheme {
    pub fn title_style(&self) -> Style {
        Style::default().fg(self.title).add_modifier(Modifier::BOLD)
    }

    pub fn section_style(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn state_color(&self, state: ProcessState) -> Color {
        match state {
            ProcessState::New => self.muted,
            ProcessState::Ready => self.warn,
            ProcessState::Running => self.ok,
            ProcessState::Blocked => self.critical,
            ProcessState::Finished => self.info,
            ProcessState::Stopped => self.border,
        }
    }

    pub fn tone_border(&self, tone: CardTone) -> Color {
        match tone {
            CardTone::Active => self.border,
            CardTone::Blocked => self.critical,
            CardTone::Finalized => self.info,
        }
    }

    pub fn interval_color(&self, style: IntervalStyle) -> Color {
        match style {
            IntervalStyle::Solid => self.ok,
            IntervalStyle::Narrow => self.critical,
            IntervalStyle::Dashed => self.warn,
        }
    }

    pub fn note_color(&self, note: &str) -> Color {
        let lower = note.to_ascii_lowercase();
        if lower.contains("offline") || lower.contains("dropped") || lower.contains("ignored") {
            self.critical
        } else if lower.contains("limit") || lower.contains("not available") || lower.contains("not sent") {
            self.warn
        } else if lower.contains("sent") || lower.contains("connected") {
            self.ok
        } else {
            self.muted
        }
    }
}
