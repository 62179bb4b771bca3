use std::collections::HashSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Main,
    Bonus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub path: String,
    pub title: String,
    /// Sub-track label such as "2.1".
    pub sub_section: Option<String>,
    pub optional: bool,
    pub quiz: bool,
    pub conclusion: bool,
}

impl Section {
    pub fn new(path: &str, title: &str) -> Self {
        Section {
            path: path.to_string(),
            title: title.to_string(),
            sub_section: None,
            optional: false,
            quiz: false,
            conclusion: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn quiz(mut self) -> Self {
        self.quiz = true;
        self
    }

    pub fn conclusion(mut self) -> Self {
        self.conclusion = true;
        self
    }

    pub fn in_track(mut self, label: &str) -> Self {
        self.sub_section = Some(label.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub id: String,
    pub title: String,
    pub kind: UnitKind,
    pub sections: Vec<Section>,
}

impl Unit {
    pub fn new(id: &str, title: &str, kind: UnitKind, sections: Vec<Section>) -> Self {
        Unit {
            id: id.to_string(),
            title: title.to_string(),
            kind,
            sections,
        }
    }

    pub fn section_index(&self, path: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.path == path)
    }
}

/// Ordered, read-only course structure. Declaration order of units and of the
/// sections inside each unit is the document order.
#[derive(Debug, Clone)]
pub struct CurriculumTable {
    units: Vec<Unit>,
}

impl CurriculumTable {
    pub fn new(units: Vec<Unit>) -> Result<Self> {
        let mut ids = HashSet::new();
        for unit in &units {
            if !ids.insert(unit.id.as_str()) {
                bail!("duplicate unit id '{}' in curriculum", unit.id);
            }
            if unit.sections.is_empty() {
                bail!("unit '{}' has no sections", unit.id);
            }
            let mut paths = HashSet::new();
            for section in &unit.sections {
                if !paths.insert(section.path.as_str()) {
                    bail!("duplicate section path '{}' in unit '{}'", section.path, unit.id);
                }
            }
        }
        Ok(CurriculumTable { units })
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, id: &str) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn unit_index(&self, id: &str) -> Option<usize> {
        self.units.iter().position(|u| u.id == id)
    }

    pub fn section_count(&self) -> usize {
        self.units.iter().map(|u| u.sections.len()).sum()
    }

    /// Sections declared in every unit before `unit_idx`.
    pub fn sections_before(&self, unit_idx: usize) -> usize {
        self.units[..unit_idx].iter().map(|u| u.sections.len()).sum()
    }

    /// The Hugging Face Agents Course, in course order.
    pub fn agents_course() -> Self {
        use UnitKind::{Bonus, Main};

        let units = vec![
            Unit::new(
                "unit0",
                "WELCOME TO THE COURSE",
                Main,
                vec![
                    Section::new("introduction", "Welcome to the course 👋"),
                    Section::new("discord101", "Discord 101").optional(),
                    Section::new("onboarding", "Onboarding").optional(),
                ],
            ),
            Unit::new(
                "unit1",
                "INTRODUCTION TO AGENTS",
                Main,
                vec![
                    Section::new("introduction", "Introduction"),
                    Section::new("quiz1", "Quick Quiz 1").quiz(),
                    Section::new("what-are-llms", "What are LLMs?"),
                    Section::new("messages-and-special-tokens", "Messages and Special Tokens"),
                    Section::new("tools", "What are Tools?"),
                    Section::new("quiz2", "Quick Quiz 2").quiz(),
                    Section::new(
                        "agent-steps-and-structure",
                        "Understanding AI Agents through the Thought-Action-Observation Cycle",
                    ),
                    Section::new("thoughts", "Thoughts: Internal Reasoning and the Be-An-AgentPlus"),
                    Section::new(
                        "actions",
                        "Actions: Enabling the Agent to Engage with its Environment",
                    ),
                    Section::new(
                        "observations",
                        "Observe: Integrating Feedback to Reflect and Adapt",
                    ),
                    Section::new("dummy-agent-library", "Dummy Agent Library"),
                    Section::new("tutorial", "Let's Create Our First Agent Using smokeagents"),
                    Section::new("final-quiz", "Unit 1 Final Quiz").quiz(),
                    Section::new("conclusion", "Conclusion").conclusion(),
                ],
            ),
            Unit::new(
                "unit2",
                "FRAMEWORKS FOR AI AGENTS",
                Main,
                vec![
                    Section::new("introduction", "Frameworks for AI Agents"),
                    // 2.1 smolagents
                    Section::new("smolagents/introduction", "Introduction to smokeagents").in_track("2.1"),
                    Section::new("smolagents/why_use_smolagents", "Why use SmokeAgents?").in_track("2.1"),
                    Section::new("smolagents/quiz1", "Quick Quiz 1").quiz().in_track("2.1"),
                    Section::new("smolagents/code_agents", "Building Agents That Use Code").in_track("2.1"),
                    Section::new(
                        "smolagents/tool_calling_agents",
                        "Writing actions as code snippets or JSON blobs",
                    )
                    .in_track("2.1"),
                    Section::new("smolagents/tools", "Tools").in_track("2.1"),
                    Section::new("smolagents/retrieval_agents", "Retrieval Agents").in_track("2.1"),
                    Section::new("smolagents/quiz2", "Quick Quiz 2").quiz().in_track("2.1"),
                    Section::new("smolagents/multi_agent_systems", "Multi-Agent Systems").in_track("2.1"),
                    Section::new("smolagents/vision_agents", "Vision and Browser agents").in_track("2.1"),
                    Section::new("smolagents/final_quiz", "Final Quiz").quiz().in_track("2.1"),
                    Section::new("smolagents/conclusion", "Conclusion").conclusion().in_track("2.1"),
                    // 2.2 LlamaIndex
                    Section::new("llama-index/introduction", "Introduction to LlamaIndex").in_track("2.2"),
                    Section::new("llama-index/llama-hub", "Introduction to LlamaHub").in_track("2.2"),
                    Section::new("llama-index/components", "What are Components in LlamaIndex?")
                        .in_track("2.2"),
                    Section::new("llama-index/tools", "Using Tools in LlamaIndex").in_track("2.2"),
                    Section::new("llama-index/quiz1", "Quick Quiz 1").quiz().in_track("2.2"),
                    Section::new("llama-index/agents", "Using Agents in LlamaIndex").in_track("2.2"),
                    Section::new("llama-index/workflows", "Creating Agents Workflows in LlamaIndex")
                        .in_track("2.2"),
                    Section::new("llama-index/quiz2", "Quick Quiz 2").quiz().in_track("2.2"),
                    Section::new("llama-index/conclusion", "Conclusion").conclusion().in_track("2.2"),
                    // 2.3 LangGraph
                    Section::new("langgraph/introduction", "Introduction to LangGraph").in_track("2.3"),
                    Section::new("langgraph/when_to_use_langgraph", "What is LangGraph?").in_track("2.3"),
                    Section::new("langgraph/building_blocks", "Building Blocks of LangGraph").in_track("2.3"),
                    Section::new("langgraph/first_graph", "Building Your First LangGraph").in_track("2.3"),
                    Section::new("langgraph/document_analysis_agent", "Document Analysis Graph")
                        .in_track("2.3"),
                    Section::new("langgraph/quiz1", "Quick Quiz 1").quiz().in_track("2.3"),
                    Section::new("langgraph/conclusion", "Conclusion").conclusion().in_track("2.3"),
                ],
            ),
            Unit::new(
                "unit3",
                "USE CASE FOR AGENTS: RAG",
                Main,
                vec![
                    Section::new("agentic-rag/introduction", "Introduction to Use Case for Agents: RAG"),
                    Section::new("agentic-rag/agentic-rag", "Agentic Retrieval Augmented Generation (RAG)"),
                    Section::new("agentic-rag/invitees", "Creating a RAG Tool for Guest Stories"),
                    Section::new("agentic-rag/tools", "Building and Integrating Tools for Your Agent"),
                    Section::new("agentic-rag/agent", "Creating Your Own Agent"),
                    Section::new("agentic-rag/conclusion", "Conclusion").conclusion(),
                ],
            ),
            Unit::new(
                "unit4",
                "FINAL PROJECT - CREATE, TEST, AND CERTIFY YOUR AGENT",
                Main,
                vec![
                    Section::new("introduction", "Introduction to Final Test"),
                    Section::new("what-is-gaia", "What is GAIA?"),
                    Section::new("hands-on", "The Final Hands-On"),
                    Section::new("get-your-certificate", "Get Your Certificate Of Excellence"),
                    Section::new("conclusion", "Conclusion of the Course").conclusion(),
                    Section::new("additional-readings", "What Should You Learn Next!"),
                ],
            ),
            Unit::new(
                "bonus-unit1",
                "FINE-TUNING AN LLM FOR FUNCTION CALLING",
                Bonus,
                vec![
                    Section::new("introduction", "Introduction"),
                    Section::new("what-is-function-calling", "What is Function Calling?"),
                    Section::new("fine-tuning", "Let's Fine Tune your model for Function calling"),
                    Section::new("conclusion", "Conclusion").conclusion(),
                ],
            ),
            Unit::new(
                "bonus-unit2",
                "AGENT OBSERVABILITY AND EVALUATION",
                Bonus,
                vec![
                    Section::new("introduction", "Introduction"),
                    Section::new("observability", "What is agent observability and evaluation?"),
                    Section::new("monitoring", "Monitoring and evaluating agents"),
                    Section::new("quiz", "Quiz").quiz(),
                ],
            ),
            Unit::new(
                "bonus-unit3",
                "AGENTS VS GAMES WITH POKEMON",
                Bonus,
                vec![
                    Section::new("introduction", "Introduction"),
                    Section::new("state-of-art", "The State of the Art in Using LLM in Games"),
                    Section::new("from-llm-to-agents", "From LLMs to AI Agents"),
                    Section::new("building_your_pokemon_agent", "Build Your Own Pokemon Battle Agent"),
                    Section::new("launching_agent_battle", "Launching Your Pokemon Battle Agent"),
                    Section::new("conclusion", "Conclusion").conclusion(),
                ],
            ),
        ];

        CurriculumTable::new(units).expect("built-in curriculum table is valid")
    }
}

// ── Tests ──
