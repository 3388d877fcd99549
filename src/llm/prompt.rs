const INSTRUCTION: &str = "Please provide a helpful response based on the PDF context if relevant, or answer the question directly if the PDF context is not applicable.";

/// Compose the single-shot prompt. Without context the question goes out as is.
pub fn build_prompt(context: &str, question: &str) -> String {
    if context.is_empty() {
        return question.to_string();
    }
    format!("Context from PDF:\n{context}\n\nUser question: {question}\n\n{INSTRUCTION}")
}
