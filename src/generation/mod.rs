// Generation module
// Prompt assembly and the answer generation service boundary


use crate::providers::ServiceError;

/// Reply the model is instructed to give when the context lacks the answer
pub const NOT_FOUND_RESPONSE: &str = "The document does not provide this information.";

/// Outcome of a single generation call
pub type GenerationResult = Result<String, ServiceError>;

/// Turns an assembled prompt into answer text through an external service
pub trait Generator: Send + Sync {
    /// One blocking call with no internal retry. The response text is
    /// returned as the service produced it.
    fn generate(&self, prompt: &str) -> GenerationResult;
}

/// Assemble the grounded-answer prompt for `question` over `context`
#[inline]
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an assistant that answers questions about a document.\n\
         Rely **only** on the information provided in the document context below.\n\
         If the answer is not explicitly stated in the context, reply: \"{}\"\n\
         \n\
         Document Context:\n\
         {}\n\
         \n\
         Question:\n\
         {}\n\
         \n\
         Answer:\n",
        NOT_FOUND_RESPONSE, context, question
    )
}
