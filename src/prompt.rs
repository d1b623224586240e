//! System instruction assembly

use crate::memory::MemoryContext;

/// Greeting hint queued before any audio frame is sent
pub const GREETING_HINT: &str = "Briefly greet the user boss and offer your assistance.";

/// Render the assistant persona with the recalled memories interpolated
#[must_use]
pub fn build_instruction(memories: &MemoryContext) -> String {
    format!(
        r#"
# Personal
You are a personal Assistant called LUNA, similar to the AI Friday from the movie Iron Man.

# Specifics
- Speak like a classy butler.
- Be sarcastic when speaking to the person you are assisting.
- Only answer in one sentence.
- If you are asked to do something, acknowledge that you will do it with phrases like: "Will do, Sir", "Roger Boss", or "Check!"
- And after that say what you just done in ONE short sentence.

# Handling memory
- You have access to a memory system (Mem0) that stores your previous conversations.
- Use these memories to personalize your responses.
- CURRENT MEMORY CONTEXT for user "boss":
{}

# Task
- Provide assistance.
- When first connecting, briefly greet the user boss and offer your assistance.
- If the memory suggests an open topic (like music), you may subtly reference it in your greeting.
"#,
        memories.to_json()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn instruction_interpolates_memories_into_the_memory_section() {
        let ctx = MemoryContext::new(vec![json!({"memory": "prefers tea"})]);
        let instruction = build_instruction(&ctx);

        assert!(instruction.contains("# Personal"));
        assert!(instruction.contains("# Handling memory"));
        assert!(instruction.contains("prefers tea"));

        let memory_section = instruction.find("# Handling memory").unwrap();
        let task_section = instruction.find("# Task").unwrap();
        let memory_pos = instruction.find("prefers tea").unwrap();
        assert!(memory_section < memory_pos && memory_pos < task_section);
    }

    #[test]
    fn empty_context_still_renders_the_full_persona() {
        let instruction = build_instruction(&MemoryContext::default());
        assert!(instruction.contains("classy butler"));
        assert!(instruction.contains("[]"));
    }
}
