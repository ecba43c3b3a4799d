//! The fixed anti-hallucination instruction injected into the model's
//! instruction channel whenever an outbound payload carries placeholders
//! (the Anti-Hallucination Prompt). Its purpose is to
//! dissuade the model from inventing new placeholders, changing their
//! numbers, or redacting un-bracketed values on its own authority.

pub const ANTI_HALLUCINATION_INSTRUCTION: &str = "IMPORTANT: Some values in this conversation have been replaced with bracketed placeholders like [person_1] or [ssn_1]. You MUST use these placeholders exactly as they appear — never invent new ones, never change their numbers, and never create placeholders for values that are not already bracketed. ALL UN-BRACKETED VALUES ARE SAFE TO USE EXACTLY AS-IS.";
