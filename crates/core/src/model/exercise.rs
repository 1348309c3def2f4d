use crate::model::ids::ExerciseId;
use crate::model::level::ProficiencyLevel;
use crate::model::profile::UserProfile;

/// A short writing prompt inside an exercise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub title: &'static str,
    pub situation: &'static str,
    pub question: &'static str,
}

/// Static exercise definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exercise {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub level: ProficiencyLevel,
    pub scenarios: &'static [Scenario],
}

impl Exercise {
    /// Typed id for this entry.
    ///
    /// # Panics
    ///
    /// Never in practice: catalog ids are non-blank literals, checked by tests.
    #[must_use]
    pub fn exercise_id(&self) -> ExerciseId {
        ExerciseId::new(self.id).expect("catalog ids are non-blank")
    }

    #[must_use]
    pub fn is_interactive(&self) -> bool {
        !self.scenarios.is_empty()
    }
}

/// Exercise with per-user status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseStatus {
    pub exercise: &'static Exercise,
    pub completed: bool,
    pub locked: bool,
}

const GREETINGS_SCENARIOS: &[Scenario] = &[
    Scenario {
        title: "Encuentro Formal",
        situation: "Estás en una conferencia y quieres presentarte a un ponente que admiras. ¿Cómo te presentarías profesionalmente?",
        question: "Escribe tu presentación formal.",
    },
    Scenario {
        title: "Saludo Informal",
        situation: "Te encuentras con un amigo que no veías hace tiempo en una cafetería. ¿Cómo lo saludarías?",
        question: "Escribe tu saludo informal.",
    },
];

macro_rules! exercise {
    ($id:literal, $title:literal, $desc:literal, $level:ident) => {
        exercise!($id, $title, $desc, $level, &[])
    };
    ($id:literal, $title:literal, $desc:literal, $level:ident, $scenarios:expr) => {
        Exercise {
            id: $id,
            title: $title,
            description: $desc,
            level: ProficiencyLevel::$level,
            scenarios: $scenarios,
        }
    };
}

/// Ordered exercise catalog. Order defines unlocking.
pub static CATALOG: &[Exercise] = &[
    exercise!("greetings", "Saludos y Presentaciones", "Practica cómo saludar y presentarte en situaciones formales e informales.", A1, GREETINGS_SCENARIOS),
    exercise!("articles", "Artículos y Género", "Usa correctamente los artículos definidos e indefinidos.", A1),
    exercise!("present-tense", "Presente de Indicativo", "Conjuga verbos regulares e irregulares en presente.", A1),
    exercise!("ser-estar", "Ser vs. Estar", "Domina la diferencia entre estos dos verbos esenciales.", A2),
    exercise!("past-tense", "Pretérito Perfecto", "Aprende a hablar de acciones pasadas.", A2),
    exercise!("adjectives", "Adjetivos: Concordancia y Posición", "Aprende a describir cosas y personas.", A2),
    exercise!("gustar", "Verbos como Gustar", "Aprende a usar verbos que funcionan de manera diferente.", A2),
    exercise!("comparisons", "Comparativos y Superlativos", "Compara personas, cosas y situaciones.", A2),
    exercise!("imperfect-tense", "Pretérito Imperfecto", "Describe situaciones y hábitos en el pasado.", B1),
    exercise!("future-tense", "Futuro Simple", "Habla sobre tus planes y predicciones.", B1),
    exercise!("por-para", "Por vs. Para", "Entiende las diferencias de uso.", B1),
    exercise!("pronouns", "Pronombres de Objeto Directo e Indirecto", "Usa los pronombres para evitar repeticiones.", B1),
    exercise!("commands", "Imperativo (Mandatos)", "Da órdenes y sugerencias formal e informalmente.", B1),
    exercise!("subjunctive-present", "Subjuntivo Presente", "Expresa deseos, dudas y emociones.", B2),
    exercise!("conditional", "Condicional Simple", "Habla de situaciones hipotéticas.", B2),
    exercise!("passive-voice", "La Voz Pasiva", "Aprende a usar la pasiva con \"ser\" y la pasiva refleja.", B2),
    exercise!("connectors", "Conectores Discursivos", "Mejora la fluidez de tu discurso.", B2),
    exercise!("pluscuamperfecto", "Pretérito Pluscuamperfecto", "Habla de una acción pasada anterior a otra.", C1),
    exercise!("subjunctive-imperfect", "Subjuntivo Imperfecto", "Úsalo en cláusulas subordinadas en el pasado.", C1),
    exercise!("idioms", "Expresiones Idiomáticas", "Habla como un nativo con frases hechas populares.", C1),
    exercise!("formal-writing", "Escritura Formal", "Aprende a redactar correos y textos formales.", C2),
];

#[must_use]
pub fn find_exercise(id: &str) -> Option<&'static Exercise> {
    CATALOG.iter().find(|exercise| exercise.id == id)
}

/// Catalog entries with completion and lock flags for `profile`.
///
/// The first exercise is always open; every later one opens once its predecessor
/// is completed.
#[must_use]
pub fn catalog_status(profile: Option<&UserProfile>) -> Vec<ExerciseStatus> {
    let is_done = |exercise: &Exercise| {
        profile.is_some_and(|p| p.completed_exercises().iter().any(|id| id.as_str() == exercise.id))
    };

    CATALOG
        .iter()
        .enumerate()
        .map(|(index, exercise)| {
            let locked = match index.checked_sub(1) {
                None => false,
                Some(prev) => !is_done(&CATALOG[prev]),
            };
            ExerciseStatus {
                exercise,
                completed: is_done(exercise),
                locked,
            }
        })
        .collect()
}
