//! Markdown report over a completed session
//!
//! Rendered once phase 6 has completed; the HTTP layer guards that.

use crate::models::Session;
use std::fmt::Write;

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n## {}\n", title);
}

fn bullet_list(out: &mut String, items: &[String]) {
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
}

pub fn build_markdown(session: &Session) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Research Report");
    let _ = writeln!(out, "\nGenerated: {}", session.updated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(out, "Session: `{}`", session.chat_id);

    section(&mut out, "Problem Statement");
    let _ = writeln!(
        out,
        "{}",
        session
            .refined_problem
            .as_deref()
            .unwrap_or(&session.original_input)
    );

    if !session.subtopics.is_empty() {
        section(&mut out, "Research Subtopics");
        for subtopic in &session.subtopics {
            let _ = writeln!(out, "- **{}**: {}", subtopic.title, subtopic.description);
        }
    }

    if !session.papers.is_empty() {
        section(&mut out, "Analyzed Papers");
        for paper in &session.papers {
            let _ = writeln!(out, "### {}", paper.title);
            if !paper.authors.is_empty() {
                let _ = writeln!(out, "*{}*", paper.authors.join(", "));
            }
            if let Some(year) = paper.year {
                let _ = writeln!(out, "Year: {}", year);
            }
            if let Some(percent) = paper.relevance_score_percent {
                let _ = writeln!(out, "Relevance: {}%", percent);
            }
            if let Some(summary) = &paper.summary {
                let _ = writeln!(out, "\n**Summary.** {}", summary);
            }
            if let Some(methodology) = &paper.methodology {
                let _ = writeln!(out, "\n**Methodology.** {}", methodology);
            }
            if !paper.algorithms_used.is_empty() {
                let _ = writeln!(out, "\n**Algorithms.** {}", paper.algorithms_used.join(", "));
            }
            if !paper.pdf_link.is_empty() {
                let _ = writeln!(out, "\n[PDF]({})", paper.pdf_link);
            }
            let _ = writeln!(out);
        }
    }

    let analysis = &session.phase4_analysis;
    if !analysis.most_common_methodologies.is_empty()
        || !analysis.technology_or_algorithms.is_empty()
        || !analysis.datasets_used.is_empty()
        || !analysis.unique_or_less_common_approaches.is_empty()
    {
        section(&mut out, "Methodology Analysis");
        if !analysis.most_common_methodologies.is_empty() {
            let _ = writeln!(out, "**Most common methodologies:**");
            for item in &analysis.most_common_methodologies {
                let _ = writeln!(out, "- **{}**: {}", item.title, item.description);
            }
        }
        if !analysis.technology_or_algorithms.is_empty() {
            let _ = writeln!(out, "\n**Technologies and algorithms:**");
            bullet_list(&mut out, &analysis.technology_or_algorithms);
        }
        if !analysis.datasets_used.is_empty() {
            let _ = writeln!(out, "\n**Datasets:**");
            bullet_list(&mut out, &analysis.datasets_used);
        }
        if !analysis.unique_or_less_common_approaches.is_empty() {
            let _ = writeln!(out, "\n**Less common approaches:**");
            for item in &analysis.unique_or_less_common_approaches {
                let _ = writeln!(out, "- **{}**: {}", item.title, item.description);
            }
        }
    }

    if !session.phase5_solutions.is_empty() {
        section(&mut out, "Existing Solutions");
        for solution in &session.phase5_solutions {
            let _ = writeln!(out, "### {}", solution.title);
            let _ = writeln!(out, "{}", solution.summary);
            if !solution.features.is_empty() {
                let _ = writeln!(out, "\n**Features:**");
                bullet_list(&mut out, &solution.features);
            }
            if !solution.limitations.is_empty() {
                let _ = writeln!(out, "\n**Limitations:**");
                bullet_list(&mut out, &solution.limitations);
            }
            if !solution.official_website.is_empty() {
                let _ = writeln!(out, "\nWebsite: {}", solution.official_website);
            }
            let _ = writeln!(out);
        }
        if !session.phase5_notes.is_empty() {
            let _ = writeln!(out, "**Notes.** {}", session.phase5_notes);
        }
    }

    if let Some(solution) = &session.phase6_solution {
        section(&mut out, "Proposed Solution");
        let _ = writeln!(out, "{}", solution.proposed_solution);

        if !solution.problem_understanding.is_empty() {
            let _ = writeln!(out, "\n**Problem understanding.** {}", solution.problem_understanding);
        }
        if !solution.solution_architecture.is_empty() {
            let _ = writeln!(out, "\n**Architecture and approach:**");
            bullet_list(&mut out, &solution.solution_architecture);
        }
        if !solution.implementation_workflow.is_empty() {
            let _ = writeln!(out, "\n**Implementation workflow:**");
            for phase in &solution.implementation_workflow {
                let _ = writeln!(out, "\n*{}*", phase.phase_title);
                for (i, step) in phase.steps.iter().enumerate() {
                    let _ = writeln!(out, "{}. {}", i + 1, step);
                }
            }
        }
        if !solution.recommended_tech_stack.is_empty() {
            let _ = writeln!(out, "\n**Recommended tech stack:**");
            for entry in &solution.recommended_tech_stack {
                let _ = writeln!(out, "- **{}**: {}", entry.title, entry.items.join(", "));
            }
        }
        if !solution.scoring_by_factors.is_empty() {
            let _ = writeln!(out, "\n**Scoring by factors:**");
            let _ = writeln!(out, "\n| Factor | Rating | Notes |");
            let _ = writeln!(out, "|---|---|---|");
            for factor in &solution.scoring_by_factors {
                let _ = writeln!(
                    out,
                    "| {} | {}/10 | {} |",
                    factor.title, factor.rating, factor.description
                );
            }
        }
        if !solution.limitations.is_empty() {
            let _ = writeln!(out, "\n**Limitations and open questions:**");
            bullet_list(&mut out, &solution.limitations);
        }
        if !solution.additional_information.is_empty() {
            let _ = writeln!(out, "\n**Additional information:**");
            bullet_list(&mut out, &solution.additional_information);
        }
    }

    out
}
