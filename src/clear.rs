//! Clear lamps: the integer grade stored by the player's client, and the
//! two views of it the model works with.
//!
//! The coarse [`ClearType`] is what the likelihood sees (a chart is either
//! failed, easy-cleared or hard-cleared). The fine [`Lamp`] is only used for
//! display.

use serde::Serialize;
use std::fmt;

/// Coarse clear category used by the graded-response model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ClearType {
    NoPlay,
    Failed,
    Easy,
    Hard,
}

impl ClearType {
    /// Classify a raw grade code: `>=6` hard, `>=4` easy, `>=1` failed.
    pub fn from_grade(grade: i32) -> Self {
        if grade >= 6 {
            Self::Hard
        } else if grade >= 4 {
            Self::Easy
        } else if grade >= 1 {
            Self::Failed
        } else {
            Self::NoPlay
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NoPlay => "NoPlay",
            Self::Failed => "Failed",
            Self::Easy => "Easy",
            Self::Hard => "Hard",
        }
    }
}

impl fmt::Display for ClearType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fine-grained lamp, one per grade code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Lamp {
    NoPlay,
    Failed,
    Assist,
    LightAssist,
    Easy,
    Clear,
    Hard,
    ExHard,
    FullCombo,
}

impl Lamp {
    /// Grades above 8 (perfect / max in beatoraja) still show as full combo.
    pub fn from_grade(grade: i32) -> Self {
        match grade {
            g if g >= 8 => Self::FullCombo,
            7 => Self::ExHard,
            6 => Self::Hard,
            5 => Self::Clear,
            4 => Self::Easy,
            3 => Self::LightAssist,
            2 => Self::Assist,
            1 => Self::Failed,
            _ => Self::NoPlay,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NoPlay => "NoPlay",
            Self::Failed => "Failed",
            Self::Assist => "Assist",
            Self::LightAssist => "L-Assist",
            Self::Easy => "Easy",
            Self::Clear => "Clear",
            Self::Hard => "Hard",
            Self::ExHard => "ExHard",
            Self::FullCombo => "FullCombo",
        }
    }

    /// CSS class used by the HTML report.
    pub fn css_class(self) -> &'static str {
        match self {
            Self::NoPlay => "lamp-noplay",
            Self::Failed => "lamp-failed",
            Self::Assist | Self::LightAssist => "lamp-assist",
            Self::Easy => "lamp-easy",
            Self::Clear => "lamp-clear",
            Self::Hard => "lamp-hard",
            Self::ExHard => "lamp-exhard",
            Self::FullCombo => "lamp-fc",
        }
    }
}

impl fmt::Display for Lamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn coarse_category(grade: i32) -> ClearType {
    ClearType::from_grade(grade)
}

pub fn fine_category(grade: i32) -> Lamp {
    Lamp::from_grade(grade)
}

/// The next coarse lamp worth chasing. `None` once the chart is hard-cleared.
pub fn next_goal(grade: i32) -> Option<ClearType> {
    match ClearType::from_grade(grade) {
        ClearType::Hard => None,
        ClearType::Easy => Some(ClearType::Hard),
        ClearType::NoPlay | ClearType::Failed => Some(ClearType::Easy),
    }
}

/// Label for [`next_goal`]; empty when nothing is left to chase.
pub fn next_goal_label(grade: i32) -> &'static str {
    next_goal(grade).map_or("", ClearType::label)
}
