//! Sample content for seeding development databases and tests.

use qbank_core::model::{BankId, Difficulty, QuestionDraft};

fn options(texts: [&str; 4]) -> Vec<(String, String, String)> {
    ["a", "b", "c", "d"]
        .into_iter()
        .zip(texts)
        .map(|(id, text)| (id.to_owned(), id.to_ascii_uppercase(), text.to_owned()))
        .collect()
}

/// Two board-style questions: an inferior STEMI and a meningitis work-up.
#[must_use]
pub fn sample_questions(bank_id: BankId) -> Vec<QuestionDraft> {
    vec![
        QuestionDraft {
            bank_id,
            text: "A 45-year-old patient presents with chest pain that started 2 hours ago. \
                   The pain is described as crushing, substernal, and radiates to the left arm. \
                   ECG shows ST elevation in leads II, III, and aVF. \
                   What is the most likely diagnosis?"
                .into(),
            options: options([
                "Unstable angina",
                "ST-elevation myocardial infarction (STEMI)",
                "Pericarditis",
                "Aortic dissection",
            ]),
            correct_answer: "b".into(),
            explanation: Some(
                "Crushing chest pain radiating to the left arm with ST elevation in the \
                 inferior leads (II, III, aVF) indicates an acute STEMI, usually from \
                 occlusion of the right coronary artery."
                    .into(),
            ),
            subject: Some("Cardiology".into()),
            system: Some("Cardiovascular".into()),
            difficulty: Difficulty::Medium,
            tags: vec!["STEMI".into(), "ECG".into(), "Chest Pain".into()],
            images: Vec::new(),
        },
        QuestionDraft {
            bank_id,
            text: "A 30-year-old woman presents with a 3-day history of fever, headache, and \
                   neck stiffness. Physical examination reveals Kernig's sign and \
                   Brudzinski's sign. What is the most appropriate initial diagnostic test?"
                .into(),
            options: options([
                "CT scan of the head",
                "Lumbar puncture",
                "Blood cultures",
                "MRI of the brain",
            ]),
            correct_answer: "b".into(),
            explanation: Some(
                "Fever, headache, neck stiffness and positive Kernig and Brudzinski signs \
                 point to meningitis. Lumbar puncture is the diagnostic gold standard."
                    .into(),
            ),
            subject: Some("Neurology".into()),
            system: Some("Nervous".into()),
            difficulty: Difficulty::Easy,
            tags: vec![
                "Meningitis".into(),
                "Lumbar Puncture".into(),
                "Neurological Signs".into(),
            ],
            images: Vec::new(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use qbank_core::time::fixed_now;

    #[test]
    fn samples_validate() {
        for draft in sample_questions(BankId::new(1)) {
            let q = draft.validate(fixed_now()).unwrap();
            assert_eq!(q.options.len(), 4);
            assert_eq!(q.correct_answer.as_str(), "b");
        }
    }
}
