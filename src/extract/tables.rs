use crate::docx::grid::{DocumentGrid, Table};
use crate::textutil::{normalize, segments, split_date_then_text, split_key_value};

use super::record::{field_group, DefaultPolicy, FieldRecord, PLACEHOLDER};
use super::schema::{FollowUpLayout, TableRule, TableSlot};

field_group! {
    pub struct Company {
        company: "Compañía",
        claim_date: "Fecha siniestro",
        hour: "Hora",
        place: "Lugar de la visita",
        visit_date: "Fecha visita",
        doctor: "Nombre del Doctor",
    }
}

field_group! {
    pub struct InjuredParty {
        full_name: "Nombre y apellidos",
        condition: "Condición",
        address: "Domicilio",
        nif: "NIF",
        town: "Población",
        phone: "Teléfono (FyM)",
        postcode: "C.P.",
        age: "Edad",
        birth_date: "Fecha nacimiento",
        province: "Provincia",
        sex: "Sexo",
        laterality: "Lateralidad",
        profession: "Profesión",
        socioeconomic: "Nivel s.e.",
        occupation: "Puesto de trabajo / ocupación",
        sports: "Deportes",
        federated: "Federado",
        employment: "Situación laboral en el momento del accidente",
        leisure: "Actividades de ocio",
        mail: "Mail",
        protection: "Protección",
        aggravation: "¿Agravación por no uso protección?",
    }
}

field_group! {
    pub struct Family {
        marital_status: "Estado civil",
        children: "Nº de Hijos",
        minors: "Menores",
        household: "Miembros unidad familiar",
        adults: ">18 años",
        under_age: "<18 años",
        disabled: "Miembros discapacitados",
    }
}

field_group! {
    pub struct Admission {
        kind: "Tipo",
        admitted: "Fecha ingreso",
        discharged: "Fecha alta",
        record_number: "Nº Historial Clínico",
    }
}

field_group! {
    pub struct Diagnosis {
        codes: "Códigos",
        diagnosis: "Diagnóstico",
    }
}

field_group! {
    pub struct Injuries {
        very_serious: "Muy graves" => "Lesiones muy graves",
        serious: "Graves" => "Lesiones graves",
        moderate: "Moderados" => "Lesiones moderados",
        basic: "Básicos" => "Lesiones basicos",
        discharged: "Fecha alta",
        variation_reasons: "Motivos variación de fecha inicial" => "Motivos variacion fecha final",
    }
}

field_group! {
    pub struct Sequelae {
        code: "Código" => "Codigo Secuela",
        description: "Descripción secuela",
        analogy: "Analogía" => "analogía secuela",
        range: "Rango" => "rango secuela",
        provisional: "Prev./Defin." => "prev/defin secuela",
        score: "Puntuación" => "puntuación secuela",
    }
}

field_group! {
    pub struct LifeQuality {
        degree: "Perdida c vida: Grado y razonarlo",
    }
}

field_group! {
    pub struct Lawyer {
        name: "Nombre abogado",
        phone: "Teléfono" => "Telefono abogado",
    }
}

const AGGRAVATION_INLINE: &str = " ¿Agravación por no uso protección?:";
const LIFE_QUALITY_MARKERS: [&str; 2] = ["Grado y razonarlo:", "Notas:"];

/// Applies the rule of `slot` to its table; a missing table leaves every field to the
/// slot's default policy.
pub fn apply_slot(grid: &DocumentGrid, slot: &TableSlot) -> FieldRecord {
    let table = grid.table(slot.index);
    if table.is_none() {
        tracing::debug!(index = slot.index, rule = ?slot.rule, "table missing, using defaults");
    }
    apply_rule(slot.rule, table, slot.defaults)
}

pub fn apply_rule(rule: TableRule, table: Option<&Table>, defaults: DefaultPolicy) -> FieldRecord {
    match rule {
        TableRule::Company => company(table).into_record(defaults),
        TableRule::InjuredParty => injured_party(table).into_record(defaults),
        TableRule::Family => family(table).into_record(defaults),
        TableRule::Admission => {
            let mut group = Admission::default();
            header_value_into(table, |key, value| {
                if let Some(slot) = group.slot_mut(key) {
                    *slot = Some(value.trim().to_string());
                }
            });
            group.into_record(defaults)
        }
        TableRule::Diagnosis => {
            let mut group = Diagnosis::default();
            header_value_into(table, |key, value| {
                if let Some(slot) = group.slot_mut(key) {
                    *slot = Some(value.trim().to_string());
                }
            });
            group.into_record(defaults)
        }
        TableRule::Injuries => injuries(table).into_record(defaults),
        TableRule::Sequelae => sequelae(table, false).into_record(defaults),
        TableRule::LifeQuality => life_quality(table).into_record(defaults),
        TableRule::Lawyer => lawyer(table).into_record(defaults),
    }
}

/// Every `Key: Value` pair of the table, scanning normalized cells split on 2+ spaces.
fn colon_segments(table: &Table) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for cell in table.cells() {
        let cleaned = normalize(cell);
        for seg in segments(&cleaned) {
            if let Some((key, val)) = split_key_value(seg) {
                out.push((key.to_string(), val.to_string()));
            }
        }
    }
    out
}

/// Feeds trimmed headers with their raw values to `set`.
fn header_value_into(table: Option<&Table>, mut set: impl FnMut(&str, &str)) {
    for (header, value) in table.map(header_value_pairs).unwrap_or_default() {
        set(header.trim(), value);
    }
}

/// Row 0 as headers zipped with row 1 as values.
fn header_value_pairs(table: &Table) -> Vec<(&str, &str)> {
    match (table.rows.first(), table.rows.get(1)) {
        (Some(headers), Some(values)) => headers
            .iter()
            .zip(values.iter())
            .map(|(h, v)| (h.as_str(), v.as_str()))
            .collect(),
        _ => Vec::new(),
    }
}

fn company(table: Option<&Table>) -> Company {
    let mut group = Company::default();
    let Some(table) = table else {
        return group;
    };
    for (key, val) in colon_segments(table) {
        if key == "Fecha visita" {
            match split_date_then_text(&val) {
                Some((date, doctor)) => {
                    group.visit_date = Some(date.to_string());
                    group.doctor = (!doctor.is_empty()).then(|| doctor.to_string());
                }
                None => group.visit_date = Some(val),
            }
        } else if let Some(slot) = group.slot_mut(&key) {
            *slot = Some(val);
        }
    }
    group
}

fn injured_party(table: Option<&Table>) -> InjuredParty {
    let mut group = InjuredParty::default();
    for (key, val) in table.map(colon_segments).unwrap_or_default() {
        if let Some(slot) = group.slot_mut(&key) {
            *slot = Some(val.replace(AGGRAVATION_INLINE, ""));
        }
    }
    group
}

fn family(table: Option<&Table>) -> Family {
    let mut group = Family::default();
    for (key, val) in table.map(colon_segments).unwrap_or_default() {
        if let Some(slot) = group.slot_mut(&key) {
            *slot = Some(val);
        }
    }
    group
}

fn is_unset(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map_or(true, |v| v.is_empty() || v == PLACEHOLDER)
}

fn injuries(table: Option<&Table>) -> Injuries {
    let mut group = Injuries::default();
    let Some(table) = table else {
        return group;
    };
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate() {
            let cleaned = normalize(cell);
            let cleaned = cleaned.trim();
            match split_key_value(cleaned) {
                Some((key, val)) => {
                    let Some(slot) = group.slot_mut(key) else {
                        continue;
                    };
                    let mut val = val.to_string();
                    // "Key:" with its value in the next cell.
                    if val.is_empty() {
                        if let Some(next) = row.get(i + 1) {
                            let next = normalize(next);
                            let next = next.trim();
                            if !next.is_empty() && !next.contains(':') {
                                val = next.to_string();
                            }
                        }
                    }
                    *slot = Some(val);
                }
                None => {
                    let after_discharge_label =
                        i > 0 && row[i - 1].contains("Fecha alta");
                    if after_discharge_label && is_unset(&group.discharged) {
                        group.discharged = Some(cleaned.to_string());
                    }
                }
            }
        }
    }
    group
}

/// Header/value sequelae table. `skip_empty` keeps earlier values when a cell is blank.
fn sequelae(table: Option<&Table>, skip_empty: bool) -> Sequelae {
    let mut group = Sequelae::default();
    let Some(table) = table else {
        return group;
    };
    for (header, value) in header_value_pairs(table) {
        let value = normalize(value);
        let value = value.trim();
        if skip_empty && value.is_empty() {
            continue;
        }
        if let Some(slot) = group.slot_mut(header.trim()) {
            *slot = Some(value.to_string());
        }
    }
    group
}

fn life_quality(table: Option<&Table>) -> LifeQuality {
    let mut group = LifeQuality::default();
    let Some(table) = table else {
        return group;
    };
    for cell in table.cells() {
        let cleaned = normalize(cell);
        if LIFE_QUALITY_MARKERS.iter().any(|m| cleaned.contains(m)) {
            if let Some((_, val)) = split_key_value(&cleaned) {
                group.degree = Some(val.to_string());
            }
        }
    }
    group
}

fn lawyer(table: Option<&Table>) -> Lawyer {
    let mut group = Lawyer::default();
    let Some(table) = table else {
        return group;
    };
    for cell in table.cells() {
        let cleaned = normalize(cell);
        if let Some((key, val)) = split_key_value(&cleaned) {
            if let Some(slot) = group.slot_mut(key) {
                *slot = Some(val.to_string());
            }
        }
    }
    group
}

/// Injuries table of a follow-up visit. Colon-free cells of row 1 and row 2 carry the
/// discharge date and the variation reasons.
fn follow_up_injuries(table: &Table) -> Injuries {
    let mut group = Injuries::default();
    let mut discharge_parts: Vec<String> = Vec::new();
    let mut reason_parts: Vec<String> = Vec::new();
    for (row_idx, row) in table.rows.iter().enumerate() {
        for cell in row {
            let cleaned = normalize(cell);
            let cleaned = cleaned.trim();
            match split_key_value(cleaned) {
                Some((key, val)) => {
                    if val.is_empty() {
                        continue;
                    }
                    if let Some(slot) = group.slot_mut(key) {
                        *slot = Some(val.to_string());
                    }
                }
                None => match row_idx {
                    1 => discharge_parts.push(cleaned.to_string()),
                    2 => reason_parts.push(cleaned.to_string()),
                    _ => {}
                },
            }
        }
    }
    if !discharge_parts.is_empty() {
        group.discharged = Some(discharge_parts.join(" "));
    }
    if !reason_parts.is_empty() {
        group.variation_reasons = Some(reason_parts.join(" "));
    }
    group
}

/// Table-derived records of the follow-up visits, one per (injuries, sequelae) pair.
pub fn follow_up_records(grid: &DocumentGrid, layout: &FollowUpLayout) -> Vec<FieldRecord> {
    let count = grid.tables.len();
    let mut i = layout.search_from;
    while i < count && !grid.tables[i].cells().any(|c| c.contains(layout.anchor)) {
        i += 1;
    }

    let mut out = Vec::new();
    while i + 1 < count {
        let mut record = follow_up_injuries(&grid.tables[i]).into_record(DefaultPolicy::Placeholder);
        record.assign(
            sequelae(Some(&grid.tables[i + 1]), true).into_record(DefaultPolicy::Placeholder),
        );
        out.push(record);
        i += layout.stride.max(1);
    }
    tracing::debug!(visits = out.len(), "follow-up table pairs");
    out
}
