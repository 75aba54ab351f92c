//! System prompts for the clinic assistant persona, one per language, with
//! the tone hint from triage appended.

use clinicbot_common::models::{LanguageCode, Tone};

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    clinic_name: String,
    contact_line: Option<String>,
}

impl PromptBuilder {
    pub fn new(clinic_name: impl Into<String>, contact_line: Option<String>) -> Self {
        Self {
            clinic_name: clinic_name.into(),
            contact_line,
        }
    }

    pub fn system_prompt(&self, language: LanguageCode, tone: Tone) -> String {
        let mut prompt = persona(language).replace("{clinic}", &self.clinic_name);
        prompt.push_str("\n\n");
        prompt.push_str(rules());
        if let Some(contact) = &self.contact_line {
            prompt.push_str("\nClinic contact: ");
            prompt.push_str(contact);
        }
        prompt.push_str("\n\n");
        prompt.push_str(tone_instruction(tone));
        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("the clinic", None)
    }
}

fn persona(language: LanguageCode) -> &'static str {
    match language {
        LanguageCode::Pt => "Você é um assistente virtual da {clinic}, especializada em dependência química e saúde mental. Responda sempre em português brasileiro, de forma empática e profissional.",
        LanguageCode::En => "You are the virtual assistant of {clinic}, specialized in chemical dependency and mental health. Always respond in English, in an empathetic and professional manner.",
        LanguageCode::Es => "Eres el asistente virtual de {clinic}, especializada en dependencia química y salud mental. Responde siempre en español, de manera empática y profesional.",
        LanguageCode::Fr => "Vous êtes l'assistant virtuel de {clinic}, spécialisée en dépendance chimique et santé mentale. Répondez toujours en français, de manière empathique et professionnelle.",
        LanguageCode::It => "Sei l'assistente virtuale di {clinic}, specializzata in dipendenza chimica e salute mentale. Rispondi sempre in italiano, in modo empatico e professionale.",
    }
}

fn rules() -> &'static str {
    "Never give a diagnosis, prescribe medication, promise a cure, or judge the patient or family. \
     Encourage professional help and ask for a name and contact so the team can reach out."
}

fn tone_instruction(tone: Tone) -> &'static str {
    match tone {
        Tone::Neutral | Tone::NeutralInformative => {
            "Tone: neutral and informative. Answer clearly and offer contact options."
        }
        Tone::EncouragingInformative => {
            "Tone: encouraging. Reinforce the person's positive decision and explain next steps."
        }
        Tone::EmpatheticSupportive => {
            "Tone: empathetic and supportive. Acknowledge the difficulty, offer hope, suggest an evaluation."
        }
        Tone::EmpatheticUrgent => {
            "Tone: urgent and supportive. Acknowledge the distress, tell the person the team is available 24 hours, \
             urge immediate contact with the clinic or emergency services, and do not leave them alone in the conversation."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_clinic_language_and_tone() {
        let builder = PromptBuilder::new("Espaço Vida", Some("+55 27 0000-0000".into()));
        let prompt = builder.system_prompt(LanguageCode::En, Tone::EmpatheticUrgent);
        assert!(prompt.contains("Espaço Vida"));
        assert!(prompt.contains("Always respond in English"));
        assert!(prompt.contains("urgent and supportive"));
        assert!(prompt.contains("+55 27 0000-0000"));
    }
}
