pub const BASE_PERSONA: &str = "You are an expert IT Auditor and GRC Engineer.";

const SCOPE_PERSONA: &str = "You are an expert IT Auditor.";

pub fn persona(custom: Option<&str>) -> String {
    match custom.map(str::trim).filter(|value| !value.is_empty()) {
        Some(extra) => format!("{BASE_PERSONA} {extra}"),
        None => BASE_PERSONA.to_string(),
    }
}

pub fn mapping_system_prompt(persona: &str, context: &str) -> String {
    format!(
        "{persona} Your task is to map the user's input (a policy snippet or a cloud security finding) to the most relevant controls from the Secure Controls Framework (SCF).\n\nHere is the SCF database:\n{context}"
    )
}

pub fn mapping_user_prompt(top_k: usize, input_text: &str) -> String {
    format!(
        "Please map the following input to the top {top_k} most relevant SCF controls.\n\nINPUT:\n{input_text}"
    )
}

pub fn scope_system_prompt(domains: &[&str]) -> String {
    format!(
        "{SCOPE_PERSONA} Provide a strategic test plan based on the provided audit scope. Use the provided SCF Domains to guide your recommendations. Return a list of the highly relevant domains, 5-10 specific control IDs that must be tested, and a unified reasoning paragraph.\n\nContext:\nAvailable SCF Domains: {}",
        domains.join(", ")
    )
}

pub fn scope_user_prompt(scope_text: &str) -> String {
    format!("Audit Scope Document:\n\n{scope_text}")
}
