//! Prompt construction for ICD-10 extraction.

/// Instructions shared by every provider
///
/// The fine-tuned models were trained on Portuguese notes and respond best to
/// Portuguese instructions.
pub const SYSTEM_PROMPT: &str = "Você é um médico especialista em CID-10. \
Analise a nota clínica e retorne APENAS um JSON válido com ASPAS DUPLAS em todas as chaves e valores. \
Formato: {\"cids\": [{\"cid\": \"A10\", \"tipo\": \"principal\", \"evidencia\": [\"trecho literal da nota\"]}]}. \
Use \"principal\", \"secundário\" ou \"terciário\" em \"tipo\". \
Cada item de \"evidencia\" deve ser copiado literalmente da nota. \
Não use aspas simples e não escreva nada fora do JSON.";

/// User turn for a note
pub fn user_message(note: &str) -> String {
    format!("Nota: {}", note)
}

/// Full Llama-3 chat-template prompt for raw text-generation endpoints
pub fn llama3_prompt(note: &str) -> String {
    format!(
        "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\n{}<|eot_id|>\
<|start_header_id|>user<|end_header_id|>\n\n{}<|eot_id|>\
<|start_header_id|>assistant<|end_header_id|>\n\n",
        SYSTEM_PROMPT,
        user_message(note)
    )
}
