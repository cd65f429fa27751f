//! Visit history segmentation over the body paragraph stream.
//!
//! The stream is cut into blocks at every "next visit" marker line. Each block is then
//! read with a set of marker-delimited scans. Scans never share state: each takes the
//! block and a [`Cursor`] and returns what it found together with where it stopped.

use crate::textutil::{char_prefix, colon_suffix};

use super::record::{field_group, DefaultPolicy, FieldRecord, PLACEHOLDER};

pub const NEXT_VISIT_MARKER: &str = "Próxima visita:";

const ANTECEDENTS: &str = "Antecedentes médicos del lesionado";
const ACCIDENT: &str = "Descripción del accidente";
const CARE_DATA: &str = "Datos asistenciales";
const TREATMENT: &str = "Tratamiento y evolución. Exploraciones complementarias";
const EVOLUTION: &str = "Evolución";
const STATE: &str = "Estado actual y exploración física";
const CAUSALITY: &str = "Relación de causalidad";
const CAUSALITY_CRITERIA: &str = "(exclusión, cronológico, topográfico, intensidad)";
const HISTORY_MARK: &str = "HISTORIA ACTUAL:";
const EXAM_MARK: &str = "EXPLORACION FISICA:";
const TESTS_MARK: &str = "Pruebas complementarias:";
const TEMPORARY_INJURIES: &str = "Lesiones temporales";
const SEQUELAE_BASIC: &str = "Secuelas. Básico";
const INTERVENTIONS: &str = "Intervenciones quirúrgicas";
const PATRIMONIAL: &str = "Patrimonial. Daño emergente";
const VALUATION: &str = "Valoración Total Secuelas";
const VALUATION_REASONS: &str = "Motivos variación";
const CLARIFICATIONS: &str = "Aclaraciones:";
const CLARIFICATIONS_END: [&str; 2] = ["Próxima visita", "Solicitud para la autorización de pruebas"];

/// Consultation dates are the leading `dd/mm/yyyy` of the line before "Evolución".
const CONSULTATION_DATE_CHARS: usize = 10;

field_group! {
    /// Narrative fields of one visit block. `None` means the block kind never sets it.
    pub struct VisitNarrative {
        antecedents: "Antecedentes médicos del lesionado",
        accident: "Descripción del accidente",
        treatment: "Tratamiento y evolución. Exploraciones complementarias",
        consultation_date: "Fecha de consulta extra",
        causality: "Relación de causalidad",
        history: "HISTORIA ACTUAL",
        exam: "EXPLORACION FISICA",
        tests: "Pruebas complementarias",
        interventions: "Intervenciones quirúrgicas",
        patrimonial: "Patrimonial. Daño emergente (se indemniza su importe)",
        valuation: "Valoración Total Secuelas",
        valuation_reasons: "Motivos variación",
        clarifications: "Aclaraciones",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    /// Block 0, the index visit.
    Index,
    FollowUp,
}

/// Paragraph-derived records: the index visit (if the stream has any block) and the
/// follow-up visits in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisitSegments {
    pub first: Option<FieldRecord>,
    pub follow_ups: Vec<FieldRecord>,
}

/// Position inside a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(usize);

impl Cursor {
    pub fn index(self) -> usize {
        self.0
    }

    fn next(self) -> Self {
        Cursor(self.0 + 1)
    }
}

#[derive(Clone, Copy)]
struct Block<'a> {
    lines: &'a [String],
}

impl<'a> Block<'a> {
    fn line(&self, at: Cursor) -> Option<&'a str> {
        self.lines.get(at.0).map(String::as_str)
    }

    /// First line exactly equal to `heading`.
    fn find(&self, heading: &str) -> Option<Cursor> {
        self.lines.iter().position(|l| l == heading).map(Cursor)
    }

    /// Lines from `from` up to (not including) the first one matching `stop`.
    fn take_until(&self, from: Cursor, stop: impl Fn(&str) -> bool) -> (Vec<&'a str>, Cursor) {
        let mut at = from;
        let mut taken = Vec::new();
        while let Some(line) = self.line(at) {
            if stop(line) {
                break;
            }
            taken.push(line);
            at = at.next();
        }
        (taken, at)
    }

    /// Same-line colon suffix of the line at `at` (if non-empty) followed by the lines
    /// after it up to `stop`.
    fn suffix_then_until(&self, at: Cursor, stop: impl Fn(&str) -> bool) -> (Vec<&'a str>, Cursor) {
        let mut parts: Vec<&'a str> = self
            .line(at)
            .and_then(colon_suffix)
            .filter(|v| !v.is_empty())
            .into_iter()
            .collect();
        let (rest, end) = self.take_until(at.next(), stop);
        parts.extend(rest);
        (parts, end)
    }
}

fn join_or_placeholder(parts: &[&str], sep: &str) -> String {
    if parts.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        parts.join(sep)
    }
}

/// Splits the paragraph stream at marker lines. Lines are trimmed; marker lines are
/// dropped and empty blocks are not kept.
pub fn split_blocks(paragraphs: &[String]) -> Vec<Vec<String>> {
    let mut blocks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for line in paragraphs {
        let line = line.trim();
        if line.contains(NEXT_VISIT_MARKER) {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.to_string());
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

pub fn segment_visits(paragraphs: &[String]) -> VisitSegments {
    let blocks = split_blocks(paragraphs);
    tracing::debug!(blocks = blocks.len(), "visit blocks");

    let mut iter = blocks.iter();
    let first = iter
        .next()
        .map(|b| read_block(b, BlockKind::Index).into_record(DefaultPolicy::Absent));
    let follow_ups = iter
        .map(|b| read_block(b, BlockKind::FollowUp).into_record(DefaultPolicy::Absent))
        .collect();
    VisitSegments { first, follow_ups }
}

pub fn read_block(lines: &[String], kind: BlockKind) -> VisitNarrative {
    let block = Block { lines };
    let mut visit = VisitNarrative::default();

    if kind == BlockKind::Index {
        visit.antecedents = Some(antecedents(block));
        visit.accident = Some(accident(block));
    }

    let (treatment, consultation_date) = treatment(block, kind);
    visit.treatment = Some(treatment);
    visit.consultation_date = Some(consultation_date);

    match clinical_state(block, kind) {
        Some((state, stopped_at)) => {
            let [history, exam, tests] = split_state(&state);
            visit.history = Some(history);
            visit.exam = Some(exam);
            visit.tests = Some(tests);
            if kind == BlockKind::Index {
                visit.causality = Some(causality(block, stopped_at));
            }
        }
        None => {
            tracing::debug!(?kind, "no clinical state heading");
            visit.history = Some(PLACEHOLDER.to_string());
            visit.exam = Some(PLACEHOLDER.to_string());
            visit.tests = Some(PLACEHOLDER.to_string());
            if kind == BlockKind::Index {
                visit.causality = Some(PLACEHOLDER.to_string());
            }
        }
    }

    let (interventions, patrimonial) = temporary_injuries(block);
    visit.interventions = Some(interventions);
    visit.patrimonial = Some(patrimonial);

    let (valuation, reasons) = sequelae_valuation(block);
    visit.valuation = Some(valuation);
    visit.valuation_reasons = Some(reasons);

    visit.clarifications = Some(clarifications(block));
    visit
}

fn antecedents(block: Block<'_>) -> String {
    block
        .find(ANTECEDENTS)
        .and_then(|at| block.line(at.next()))
        .unwrap_or(PLACEHOLDER)
        .to_string()
}

/// May be empty when the heading is directly followed by "Datos asistenciales".
fn accident(block: Block<'_>) -> String {
    match block.find(ACCIDENT) {
        Some(at) => block.take_until(at.next(), |l| l == CARE_DATA).0.join(" "),
        None => PLACEHOLDER.to_string(),
    }
}

/// Treatment text and consultation date.
fn treatment(block: Block<'_>, kind: BlockKind) -> (String, String) {
    let heading = [TREATMENT, EVOLUTION]
        .into_iter()
        .filter_map(|h| block.find(h).map(|at| (at, h)))
        .min_by_key(|(at, _)| *at);
    let Some((at, heading)) = heading else {
        return (PLACEHOLDER.to_string(), String::new());
    };

    let (parts, _) = block.take_until(at.next(), |l| l == STATE);
    let consultation_date = match (kind, heading, at.index().checked_sub(1)) {
        (BlockKind::FollowUp, EVOLUTION, Some(prev)) => block
            .line(Cursor(prev))
            .map(|l| char_prefix(l, CONSULTATION_DATE_CHARS).to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };
    (parts.join("\n\n"), consultation_date)
}

/// Joined clinical state text and the cursor where the scan stopped (on the causality
/// heading, or past the end).
fn clinical_state(block: Block<'_>, kind: BlockKind) -> Option<(String, Cursor)> {
    let at = block.find(STATE)?;
    let (parts, stopped_at) = block.take_until(at.next(), |l| l == CAUSALITY);
    let sep = match kind {
        BlockKind::Index => "\n\n",
        BlockKind::FollowUp => " ",
    };
    Some((parts.join(sep), stopped_at))
}

/// History, exam and tests from the clinical state text. Each sub-header takes the text
/// between its first and second occurrence; a missing sub-header leaves it and every
/// later one at the placeholder.
fn split_state(state: &str) -> [String; 3] {
    let mut out = [PLACEHOLDER; 3].map(String::from);

    let Some(rest) = state.split(HISTORY_MARK).nth(1) else {
        return out;
    };
    let rest = rest.trim();
    out[0] = before(rest, EXAM_MARK);

    let Some(rest) = rest.split(EXAM_MARK).nth(1) else {
        return out;
    };
    let rest = rest.trim();
    out[1] = before(rest, TESTS_MARK);

    if let Some(rest) = rest.split(TESTS_MARK).nth(1) {
        out[2] = rest.trim().to_string();
    }
    out
}

fn before(text: &str, delim: &str) -> String {
    text.split(delim).next().unwrap_or("").trim().to_string()
}

/// Causality text, resuming where the clinical state scan stopped. The criteria line is
/// skipped once.
fn causality(block: Block<'_>, stopped_at: Cursor) -> String {
    if block.line(stopped_at) != Some(CAUSALITY) {
        return PLACEHOLDER.to_string();
    }
    let (mut parts, at) = block.take_until(stopped_at.next(), |l| {
        l == TEMPORARY_INJURIES || l.contains(CAUSALITY_CRITERIA)
    });
    if block.line(at).is_some_and(|l| l.contains(CAUSALITY_CRITERIA)) {
        let (rest, _) = block.take_until(at.next(), |l| l == TEMPORARY_INJURIES);
        parts.extend(rest);
    }
    parts.join(" ")
}

/// Surgical interventions and patrimonial damage under "Lesiones temporales".
fn temporary_injuries(block: Block<'_>) -> (String, String) {
    let mut interventions = PLACEHOLDER.to_string();
    let mut patrimonial = PLACEHOLDER.to_string();
    let Some(start) = block.find(TEMPORARY_INJURIES) else {
        return (interventions, patrimonial);
    };

    let mut at = start.next();
    while let Some(line) = block.line(at) {
        if line == SEQUELAE_BASIC {
            break;
        }
        if line.starts_with(INTERVENTIONS) {
            let (parts, end) = block.suffix_then_until(at, |l| l.starts_with(PATRIMONIAL));
            interventions = join_or_placeholder(&parts, " ");
            at = end;
        } else if line.starts_with(PATRIMONIAL) {
            let (parts, end) = block.suffix_then_until(at, |l| l == SEQUELAE_BASIC);
            patrimonial = join_or_placeholder(&parts, "\n\n");
            at = end;
        } else {
            at = at.next();
        }
    }
    (interventions, patrimonial)
}

/// Total sequelae valuation and, from the line right after it, the variation reasons.
fn sequelae_valuation(block: Block<'_>) -> (String, String) {
    let mut valuation = PLACEHOLDER.to_string();
    let mut reasons = PLACEHOLDER.to_string();

    let Some(idx) = block.lines.iter().position(|l| l.contains(VALUATION)) else {
        return (valuation, reasons);
    };
    let at = Cursor(idx);
    if let Some(value) = block.line(at).and_then(colon_suffix) {
        if !value.is_empty() {
            valuation = value.to_string();
        }
        let next = block.line(at.next()).filter(|l| l.contains(VALUATION_REASONS));
        if let Some(value) = next.and_then(colon_suffix).filter(|v| !v.is_empty()) {
            reasons = value.to_string();
        }
    }
    (valuation, reasons)
}

fn clarifications(block: Block<'_>) -> String {
    match block.find(CLARIFICATIONS) {
        Some(at) => {
            let (parts, _) = block.suffix_then_until(at, |l| {
                CLARIFICATIONS_END.iter().any(|end| l.starts_with(end))
            });
            join_or_placeholder(&parts, "\n\n")
        }
        None => PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn index_block() -> Vec<String> {
        lines(&[
            "Antecedentes médicos del lesionado",
            "Sin interés",
            "Descripción del accidente",
            "Colisión por alcance",
            "en rotonda",
            "Datos asistenciales",
            "Tratamiento y evolución. Exploraciones complementarias",
            "Collarín",
            "Rehabilitación",
            "Estado actual y exploración física",
            "HISTORIA ACTUAL: cervicalgia",
            "EXPLORACION FISICA: contractura",
            "Pruebas complementarias: RX normal",
            "Relación de causalidad",
            "Se cumplen los criterios",
            "Criterios (exclusión, cronológico, topográfico, intensidad)",
            "Todos positivos",
            "Lesiones temporales",
            "Intervenciones quirúrgicas: ninguna",
            "a valorar",
            "Patrimonial. Daño emergente: 120 euros",
            "farmacia",
            "Secuelas. Básico",
            "Valoración Total Secuelas: 3 puntos",
            "Motivos variación: sin cambios",
            "Aclaraciones:",
            "Paciente colaborador",
            "Solicitud para la autorización de pruebas",
        ])
    }

    #[test]
    fn blocks_split_on_marker_lines() {
        let stream = lines(&["A", "Próxima visita:", "B", "C", "  Próxima visita: x ", "D"]);
        assert_eq!(
            split_blocks(&stream),
            vec![lines(&["A"]), lines(&["B", "C"]), lines(&["D"])]
        );
        assert!(split_blocks(&lines(&["Próxima visita:"])).is_empty());
        assert_eq!(split_blocks(&lines(&[" solo "])), vec![lines(&["solo"])]);
    }

    #[test]
    fn index_block_reads_every_section() {
        let v = read_block(&index_block(), BlockKind::Index);
        assert_eq!(v.antecedents.as_deref(), Some("Sin interés"));
        assert_eq!(v.accident.as_deref(), Some("Colisión por alcance en rotonda"));
        assert_eq!(v.treatment.as_deref(), Some("Collarín\n\nRehabilitación"));
        assert_eq!(v.consultation_date.as_deref(), Some(""));
        assert_eq!(v.history.as_deref(), Some("cervicalgia"));
        assert_eq!(v.exam.as_deref(), Some("contractura"));
        assert_eq!(v.tests.as_deref(), Some("RX normal"));
        assert_eq!(
            v.causality.as_deref(),
            Some("Se cumplen los criterios Todos positivos")
        );
        assert_eq!(v.interventions.as_deref(), Some("ninguna a valorar"));
        assert_eq!(v.patrimonial.as_deref(), Some("120 euros\n\nfarmacia"));
        assert_eq!(v.valuation.as_deref(), Some("3 puntos"));
        assert_eq!(v.valuation_reasons.as_deref(), Some("sin cambios"));
        assert_eq!(v.clarifications.as_deref(), Some("Paciente colaborador"));
    }

    #[test]
    fn follow_up_reads_consultation_date_before_evolution() {
        let block = lines(&[
            "12/05/2023 Revisión",
            "Evolución",
            "Mejoría",
            "Estado actual y exploración física",
            "HISTORIA ACTUAL: leve",
            "molestia EXPLORACION FISICA: normal",
            "Relación de causalidad",
        ]);
        let v = read_block(&block, BlockKind::FollowUp);
        assert_eq!(v.consultation_date.as_deref(), Some("12/05/2023"));
        assert_eq!(v.treatment.as_deref(), Some("Mejoría"));
        assert_eq!(v.history.as_deref(), Some("leve molestia"));
        assert_eq!(v.exam.as_deref(), Some("normal"));
        assert_eq!(v.tests.as_deref(), Some(PLACEHOLDER));
        assert_eq!(v.antecedents, None);
        assert_eq!(v.accident, None);
        assert_eq!(v.causality, None);
    }

    #[test]
    fn consultation_date_needs_evolution_as_earliest_heading() {
        let block = lines(&[
            "01/06/2023",
            "Tratamiento y evolución. Exploraciones complementarias",
            "Evolución",
        ]);
        let v = read_block(&block, BlockKind::FollowUp);
        assert_eq!(v.consultation_date.as_deref(), Some(""));
        assert_eq!(v.treatment.as_deref(), Some("Evolución"));

        let first_line = lines(&["Evolución", "texto"]);
        let v = read_block(&first_line, BlockKind::FollowUp);
        assert_eq!(v.consultation_date.as_deref(), Some(""));

        let v = read_block(&lines(&["01/06/2023", "Evolución"]), BlockKind::Index);
        assert_eq!(v.consultation_date.as_deref(), Some(""));
    }

    #[test]
    fn missing_headings_degrade_to_placeholder() {
        let v = read_block(&lines(&["texto libre"]), BlockKind::Index);
        assert_eq!(v.antecedents.as_deref(), Some(PLACEHOLDER));
        assert_eq!(v.accident.as_deref(), Some(PLACEHOLDER));
        assert_eq!(v.treatment.as_deref(), Some(PLACEHOLDER));
        assert_eq!(v.history.as_deref(), Some(PLACEHOLDER));
        assert_eq!(v.causality.as_deref(), Some(PLACEHOLDER));
        assert_eq!(v.interventions.as_deref(), Some(PLACEHOLDER));
        assert_eq!(v.patrimonial.as_deref(), Some(PLACEHOLDER));
        assert_eq!(v.valuation.as_deref(), Some(PLACEHOLDER));
        assert_eq!(v.valuation_reasons.as_deref(), Some(PLACEHOLDER));
        assert_eq!(v.clarifications.as_deref(), Some(PLACEHOLDER));
    }

    #[test]
    fn antecedents_heading_on_last_line() {
        let v = read_block(&lines(&["Antecedentes médicos del lesionado"]), BlockKind::Index);
        assert_eq!(v.antecedents.as_deref(), Some(PLACEHOLDER));
    }

    #[test]
    fn accident_can_be_empty() {
        let block = lines(&["Descripción del accidente", "Datos asistenciales"]);
        let v = read_block(&block, BlockKind::Index);
        assert_eq!(v.accident.as_deref(), Some(""));
    }

    #[test]
    fn causality_without_heading_after_state() {
        let block = lines(&["Estado actual y exploración física", "HISTORIA ACTUAL: x"]);
        let v = read_block(&block, BlockKind::Index);
        assert_eq!(v.history.as_deref(), Some("x"));
        assert_eq!(v.causality.as_deref(), Some(PLACEHOLDER));
    }

    #[test]
    fn state_sub_headers_take_text_up_to_a_repeat() {
        let [history, exam, tests] =
            split_state("HISTORIA ACTUAL: uno HISTORIA ACTUAL: dos EXPLORACION FISICA: tres");
        assert_eq!(history, "uno");
        assert_eq!(exam, PLACEHOLDER);
        assert_eq!(tests, PLACEHOLDER);
    }

    #[test]
    fn interventions_without_text_stay_placeholder() {
        let block = lines(&[
            "Lesiones temporales",
            "Intervenciones quirúrgicas:",
            "Patrimonial. Daño emergente",
            "Secuelas. Básico",
        ]);
        let v = read_block(&block, BlockKind::FollowUp);
        assert_eq!(v.interventions.as_deref(), Some(PLACEHOLDER));
        assert_eq!(v.patrimonial.as_deref(), Some(PLACEHOLDER));
    }

    #[test]
    fn valuation_without_colon_ignores_reasons() {
        let block = lines(&["Valoración Total Secuelas", "Motivos variación: x"]);
        let v = read_block(&block, BlockKind::FollowUp);
        assert_eq!(v.valuation.as_deref(), Some(PLACEHOLDER));
        assert_eq!(v.valuation_reasons.as_deref(), Some(PLACEHOLDER));

        let block = lines(&["Valoración Total Secuelas: 5", "otra línea", "Motivos variación: x"]);
        let v = read_block(&block, BlockKind::FollowUp);
        assert_eq!(v.valuation.as_deref(), Some("5"));
        assert_eq!(v.valuation_reasons.as_deref(), Some(PLACEHOLDER));
    }

    #[test]
    fn clarifications_stop_at_next_visit_text() {
        let block = lines(&["Aclaraciones:", "uno", "dos", "Próxima visita en un mes", "tres"]);
        let v = read_block(&block, BlockKind::FollowUp);
        assert_eq!(v.clarifications.as_deref(), Some("uno\n\ndos"));
    }

    #[test]
    fn segmentation_is_repeatable() {
        let mut stream = index_block();
        stream.push("Próxima visita:".to_string());
        stream.extend(lines(&["02/03/2023", "Evolución", "Estable"]));

        let a = segment_visits(&stream);
        let b = segment_visits(&stream);
        assert_eq!(a, b);
        assert!(a.first.is_some());
        assert_eq!(a.follow_ups.len(), 1);
        assert_eq!(a.follow_ups[0].get("Fecha de consulta extra"), Some("02/03/2023"));
        assert!(a.follow_ups[0].contains("Antecedentes médicos del lesionado"));
        assert_eq!(a.follow_ups[0].get("Antecedentes médicos del lesionado"), None);
    }

    #[test]
    fn empty_stream_has_no_visits() {
        assert_eq!(segment_visits(&[]), VisitSegments::default());
    }
}
