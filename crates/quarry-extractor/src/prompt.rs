//! User message construction for one category and one piece of text

use quarry_domain::Category;

/// Builds the user message of an extraction request
pub struct PromptBuilder<'a> {
    category: &'a Category,
    document: &'a str,
    text: &'a str,
    part: Option<(usize, usize)>,
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder
    pub fn new(category: &'a Category, document: &'a str, text: &'a str) -> Self {
        Self {
            category,
            document,
            text,
            part: None,
        }
    }

    /// Mark the text as part `ordinal` (0-based) of `total` chunks
    pub fn with_part(mut self, ordinal: usize, total: usize) -> Self {
        self.part = Some((ordinal, total));
        self
    }

    /// Build the complete user message
    pub fn build(&self) -> String {
        let mut prompt = String::with_capacity(self.text.len() + self.category.instructions.len() + 256);

        // 1. Category instructions
        prompt.push_str(self.category.instructions.trim());
        prompt.push_str("\n\n");

        // 2. Where the text comes from
        prompt.push_str(&format!("Document: {}\n", self.document));
        if let Some((ordinal, total)) = self.part {
            prompt.push_str(&format!(
                "This is part {} of {} of the document; report only what this part contains.\n",
                ordinal + 1,
                total
            ));
        }
        prompt.push('\n');

        // 3. The text to analyze
        prompt.push_str("Text to analyze:\n---\n");
        prompt.push_str(self.text);
        prompt.push_str("\n---\n\n");

        // 4. Output format reminder
        prompt.push_str(OUTPUT_FORMAT_REMINDER);

        prompt
    }
}

const OUTPUT_FORMAT_REMINDER: &str = "Return ONLY JSON: one object, several objects, or an array of \
objects. Omit any field the text does not state; never guess values. No explanations.";

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_domain::CategoryCatalog;

    #[test]
    fn test_prompt_includes_instructions_and_text() {
        let catalog = CategoryCatalog::default();
        let category = catalog.by_name("audit").unwrap();
        let prompt = PromptBuilder::new(category, "IXP-2024.pdf", "Finding 1: weak controls").build();

        assert!(prompt.starts_with("List every audit finding"));
        assert!(prompt.contains("Document: IXP-2024.pdf"));
        assert!(prompt.contains("Finding 1: weak controls"));
        assert!(prompt.contains("Return ONLY JSON"));
        assert!(!prompt.contains("This is part"));
    }

    #[test]
    fn test_prompt_marks_chunk_position() {
        let catalog = CategoryCatalog::default();
        let category = catalog.by_name("products").unwrap();
        let prompt = PromptBuilder::new(category, "ROP-1.pdf", "text").with_part(2, 5).build();
        assert!(prompt.contains("This is part 3 of 5"));
    }
}
