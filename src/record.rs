use serde::{Deserialize, Serialize};

use crate::curriculum::{Section, UnitKind};
use crate::parser::ContentBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LessonType {
    Quiz,
    Conclusion,
    Introduction,
    Content,
}

impl LessonType {
    pub fn classify(section: &Section) -> Self {
        if section.quiz {
            LessonType::Quiz
        } else if section.conclusion {
            LessonType::Conclusion
        } else if section.path.to_lowercase().contains("introduction") {
            LessonType::Introduction
        } else {
            LessonType::Content
        }
    }
}

/// Where a page sits in the curriculum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub unit: String,
    pub unit_title: String,
    /// 1-based position within the unit.
    pub unit_order: usize,
    pub kind: UnitKind,
    pub sub_section: Option<String>,
    pub optional: bool,
    pub quiz: bool,
    pub conclusion: bool,
    pub lesson_type: LessonType,
    pub global_order: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub title: String,
    pub blocks: Vec<ContentBlock>,
    /// Link hops from the start URL.
    pub depth: u32,
    /// `None` for pages collected outside the curriculum.
    pub placement: Option<Placement>,
}

impl PageRecord {
    /// Last non-empty path segment of the URL.
    pub fn slug(&self) -> &str {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("")
    }

    pub fn headings(&self) -> impl Iterator<Item = (&str, u8)> {
        self.blocks.iter().filter_map(ContentBlock::as_heading)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_type_precedence() {
        let quiz = Section::new("introduction-quiz", "Q").quiz().conclusion();
        assert_eq!(LessonType::classify(&quiz), LessonType::Quiz);

        let end = Section::new("conclusion", "C").conclusion();
        assert_eq!(LessonType::classify(&end), LessonType::Conclusion);

        let intro = Section::new("smolagents/Introduction", "I");
        assert_eq!(LessonType::classify(&intro), LessonType::Introduction);

        let plain = Section::new("tools", "T");
        assert_eq!(LessonType::classify(&plain), LessonType::Content);
    }

    #[test]
    fn slug_is_last_segment() {
        let record = PageRecord {
            url: "https://huggingface.co/learn/agents-course/unit1/tools/".into(),
            title: String::new(),
            blocks: Vec::new(),
            depth: 0,
            placement: None,
        };
        assert_eq!(record.slug(), "tools");
    }

    #[test]
    fn json_round_trip_keeps_placement() {
        let record = PageRecord {
            url: "u".into(),
            title: "t".into(),
            blocks: vec![ContentBlock::Heading { text: "h".into(), level: 2 }],
            depth: 1,
            placement: Some(Placement {
                unit: "bonus-unit1".into(),
                unit_title: "Bonus".into(),
                unit_order: 2,
                kind: UnitKind::Bonus,
                sub_section: None,
                optional: false,
                quiz: false,
                conclusion: false,
                lesson_type: LessonType::Content,
                global_order: 70,
            }),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: PageRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.headings().collect::<Vec<_>>(), vec![("h", 2)]);
    }
}
