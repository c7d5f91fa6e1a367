use tracing::info;

use crate::assistant::prompts::{autofill_prompt, JSON_ONLY_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::{call_json, ChatModel};
use crate::models::non_blank;
use crate::models::research::{AutofillRequest, ResearchSuggestion};

/// Asks the model for program details to pre-fill a research entry.
/// Nothing is stored; the caller reviews the suggestion first.
pub async fn suggest_research_details(
    model: &dyn ChatModel,
    request: AutofillRequest,
) -> Result<ResearchSuggestion, AppError> {
    let (Some(university_name), Some(program_name)) = (
        non_blank(request.university_name),
        non_blank(request.program_name),
    ) else {
        return Err(AppError::Validation(
            "University name and program name are required".to_string(),
        ));
    };

    info!(%university_name, %program_name, "Requesting research auto-fill");
    let prompt = autofill_prompt(
        &university_name,
        &program_name,
        request.country.map(|c| c.as_str()),
    );
    let mut suggestion: ResearchSuggestion = call_json(model, &prompt, JSON_ONLY_SYSTEM).await?;

    suggestion.website = non_blank(suggestion.website);
    suggestion.tuition_fees = non_blank(suggestion.tuition_fees);
    suggestion.requirements = non_blank(suggestion.requirements);
    suggestion.notes = non_blank(suggestion.notes);
    suggestion.ranking = suggestion.ranking.filter(|r| *r > 0);
    Ok(suggestion)
}
