use ideagate_schema::{
    Dimension, Evaluation, IdeaIntake, IdeaReport, MarketReport, RiskKey, SpecialistReports,
    TimingReport,
};

pub const IDEA_ANALYST_SYSTEM: &str = "You are a startup strategist. Assess what the idea is, \
what value it offers, how hard it is to build and how it makes money. Be concrete and skeptical. \
Respond only with the requested JSON object.";

pub const MARKET_ANALYST_SYSTEM: &str = "You are a market and competition analyst. Judge how \
severe the problem is, how saturated the market is, who already competes and what would \
differentiate this idea. Respond only with the requested JSON object.";

pub const TIMING_ANALYST_SYSTEM: &str = "You are a timing and founder-leverage analyst. Identify \
tailwinds and headwinds, why now is or is not the moment, and how well the founder fits the \
problem. Respond only with the requested JSON object.";

pub const SYNTHESIS_SYSTEM: &str = "You are the lead partner of an idea review board. Combine \
three specialist reports into a scored evaluation. Scores are integers from 0 to 100 where 50 is \
an unremarkable idea. Risk levels are low, medium, high or critical. Respond only with the \
requested JSON object.";

pub const SIMULATION_SYSTEM: &str = "You project the impact of adding one feature to an idea \
that has already been scored. Start every dimension from its current score exactly as given. \
Risk levels move at most one step. Recommend Add only when the net change is non-negative and no \
risk becomes more severe. Respond only with the requested JSON object.";

pub const SUMMARY_SYSTEM: &str = "You summarize how a startup idea changed between two \
evaluated versions in at most three short sentences. Mention the score change, the verdict \
change and the most important dimension movement. Respond only with the requested JSON object.";

pub fn idea_analysis(intake: &IdeaIntake) -> String {
    format!(
        "Analyze the idea and strategy of this startup.\n\n{}\n\n\
         List the key assumptions that must hold for it to work.",
        intake.to_prompt_text()
    )
}

pub fn market_analysis(intake: &IdeaIntake) -> String {
    format!(
        "Analyze the market and competition for this startup.\n\n{}\n\n\
         Name real competitors where you know them.",
        intake.to_prompt_text()
    )
}

pub fn timing_analysis(intake: &IdeaIntake) -> String {
    format!(
        "Analyze timing and founder leverage for this startup.\n\n{}",
        intake.to_prompt_text()
    )
}

pub fn synthesis(intake: &IdeaIntake, reports: &SpecialistReports) -> String {
    format!(
        "Idea intake:\n{}\n\n\
         Idea and strategy report:\n{}\n\n\
         Market and competition report:\n{}\n\n\
         Timing and leverage report:\n{}\n\n\
         Score these dimensions: {}.\n\
         Assess these risks: {}.",
        intake.to_prompt_text(),
        render_idea(&reports.idea),
        render_market(&reports.market),
        render_timing(&reports.timing),
        Dimension::ALL.map(|d| d.key()).join(", "),
        RiskKey::ALL.map(|k| k.key()).join(", "),
    )
}

pub fn simulation(intake: &IdeaIntake, feature: &str, baseline: &Evaluation) -> String {
    let mut scores = String::new();
    for (dimension, entry) in baseline.score_breakdown.iter() {
        scores.push_str(&format!("- {}: {}\n", dimension.key(), entry.score));
    }
    let mut risks = String::new();
    for (key, entry) in baseline.risk_profile.iter() {
        risks.push_str(&format!("- {}: {}\n", key.key(), entry.level));
    }
    format!(
        "Idea: {}\nTarget user: {}\nProblem: {}\n\n\
         Current total score: {} ({})\n\
         Current dimension scores (use these as `before`):\n{scores}\n\
         Current risk levels (use these as `before`):\n{risks}\n\
         Proposed feature: {}",
        intake.idea.trim(),
        intake.target_user.trim(),
        intake.problem.trim(),
        baseline.total_score,
        baseline.verdict,
        feature.trim(),
    )
}

pub fn diff_summary(facts: &str) -> String {
    format!("Summarize this version change for the founder.\n\n{facts}")
}

fn render_idea(report: &IdeaReport) -> String {
    format!(
        "Category: {}\nValue proposition: {}\nTechnical complexity: {:?}\nTech notes: {}\n\
         Monetization: {}\nKey assumptions: {}",
        report.category,
        report.value_proposition,
        report.technical_complexity,
        report.tech_notes,
        report.monetization,
        report.key_assumptions.join("; "),
    )
}

fn render_market(report: &MarketReport) -> String {
    let competitors = if report.competitors.is_empty() {
        "none identified".to_string()
    } else {
        report
            .competitors
            .iter()
            .map(|c| format!("{} ({})", c.name, c.positioning))
            .collect::<Vec<_>>()
            .join("; ")
    };
    format!(
        "Problem severity: {:?}\nMarket saturation: {:?}\nCompetitors: {competitors}\n\
         Differentiation: {}\nMarket size: {}",
        report.problem_severity,
        report.market_saturation,
        report.differentiation,
        report.market_size_note,
    )
}

fn render_timing(report: &TimingReport) -> String {
    format!(
        "Tailwinds: {}\nHeadwinds: {}\nFounder fit: {:?} ({})\nWhy now: {}",
        report.tailwinds.join("; "),
        if report.headwinds.is_empty() {
            "none".to_string()
        } else {
            report.headwinds.join("; ")
        },
        report.founder_fit,
        report.founder_fit_rationale,
        report.why_now,
    )
}
