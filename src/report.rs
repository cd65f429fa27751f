//! One flat row per visit with a fixed column order, ready for spreadsheet export.

use std::io::Write;

use anyhow::Context;
use serde::Serialize;

use crate::docx::checkbox::{Consent, NextVisit};
use crate::extract::record::FieldRecord;
use crate::extract::Extraction;

pub const DOCUMENT_ID_FIELD: &str = "Numero de documento";
pub const CONSENT_FIELD: &str = "Pérdida c vida";
pub const NEXT_VISIT_FIELD: &str = "Próxima visita";
pub const UNKNOWN_DOCUMENT: &str = "Unknown";

/// An output column and the merged field it reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub source: &'static str,
}

const fn col(name: &'static str) -> Column {
    Column { name, source: name }
}

const fn read(name: &'static str, source: &'static str) -> Column {
    Column { name, source }
}

/// Columns without a source in the extraction stay empty; they are filled by hand.
pub const COLUMNS: &[Column] = &[
    col(DOCUMENT_ID_FIELD),
    col("Compañía"),
    col("Fecha siniestro"),
    col("Hora"),
    col("Lugar de la visita"),
    col("Fecha visita"),
    col("Nombre del Doctor"),
    col("Nombre y apellidos"),
    col("Condición"),
    col("Domicilio"),
    col("NIF"),
    col("Población"),
    col("Teléfono (FyM)"),
    col("C.P."),
    col("Edad"),
    col("Fecha nacimiento"),
    col("Provincia"),
    col("Sexo"),
    col("Lateralidad"),
    col("Profesión"),
    col("Nivel s.e."),
    col("Puesto de trabajo / ocupación"),
    col("Deportes"),
    col("Situación laboral en el momento del accidente"),
    col("Actividades de ocio"),
    col("Mail"),
    col("Protección"),
    col("¿Agravación por no uso protección?"),
    col("Estado civil"),
    col("Nº de Hijos"),
    col("Menores"),
    col("Miembros unidad familiar"),
    col("<18 años"),
    col(">18 años"),
    col("Miembros discapacitados"),
    col("Ama de casa"),
    col("Total"),
    col("Parcial"),
    col("Antecedentes médicos del lesionado"),
    col("Descripción del accidente"),
    col("Tipo"),
    col("Fecha ingreso"),
    col("Fecha alta"),
    col("Nº Historial Clínico"),
    col("Códigos"),
    col("Diagnóstico"),
    read(
        "Tratamiento y evolución - processed",
        "Tratamiento y evolución. Exploraciones complementarias",
    ),
    col("Fecha de consulta extra"),
    col("HISTORIA ACTUAL"),
    col("EXPLORACION FISICA"),
    col("Pruebas complementarias"),
    col("Relación de causalidad"),
    col("Cronológico"),
    col("Topográfico"),
    col("Intensidad"),
    col("Continuidad evolutiva"),
    col("Exclusión"),
    col("Lesiones muy graves"),
    col("Lesiones graves"),
    col("Lesiones moderados"),
    col("Lesiones basicos"),
    col("Fecha alta"),
    col("Motivos variacion fecha final"),
    col("Prevista"),
    col("Definitiva"),
    col("Intervenciones quirúrgicas"),
    col("Patrimonial. Daño emergente (se indemniza su importe)"),
    col("Codigo Secuela"),
    col("Descripción secuela"),
    col("analogía secuela"),
    col("rango secuela"),
    col("prev/defin secuela"),
    col("puntuación secuela"),
    col("Valoración Total Secuelas"),
    col("Motivos variación"),
    col("DM psicofisico"),
    col("DM estético"),
    col(CONSENT_FIELD),
    col("Perdida c vida: Grado y razonarlo"),
    col("DMxperd c vida"),
    col("Pérdida feto"),
    col("P excepcional"),
    col("Asis sanit futur"),
    col("Protesis/ortesis"),
    col("RHB dom/amb"),
    col("Ayuda técnica"),
    col("Coste movilidad"),
    col("Tercera persona"),
    col("Descripción de las necesidades"),
    col("Adecuación de vehículo"),
    col("Adecuación de vivienda"),
    col("Nombre abogado"),
    col("Telefono abogado"),
    col("Actitud frente a la compañía"),
    col("Posibilidad transacción"),
    col("Precisa investigador"),
    col("Consentimiento informado"),
    col("Aclaraciones"),
    col("Medio de transporte"),
    col("Hasta"),
    col("Otros"),
    col("Seguimiento"),
    col("Final"),
    col("Final Definitivo"),
    col("Fecha"),
    col(NEXT_VISIT_FIELD),
];

#[derive(Clone, Debug)]
pub struct ReshapeOptions {
    /// Flag value given to visits that have no next-visit checkbox group.
    pub next_visit_padding: String,
}

impl Default for ReshapeOptions {
    fn default() -> Self {
        Self {
            next_visit_padding: "NO".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Report {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub warnings: Vec<String>,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            columns: COLUMNS.iter().map(|c| c.name.to_string()).collect(),
            rows: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl Report {
    /// Rows and warnings of `other` after ours. Both share the fixed column list.
    pub fn append(&mut self, other: Report) {
        self.rows.extend(other.rows);
        self.warnings.extend(other.warnings);
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::warn!("{msg}");
        self.warnings.push(msg);
    }

    /// Header row then one row per visit; `transpose` writes one line per column
    /// instead, with one further cell per visit.
    pub fn write_csv<W: Write>(&self, out: W, transpose: bool) -> anyhow::Result<()> {
        let mut writer = csv::WriterBuilder::new().from_writer(out);
        if transpose {
            let mut header = vec!["Campo".to_string()];
            header.extend((1..=self.rows.len()).map(|i| format!("Visita {i}")));
            writer.write_record(&header).context("write csv header")?;
            for (ci, name) in self.columns.iter().enumerate() {
                let mut line = vec![name.as_str()];
                line.extend(self.rows.iter().map(|r| r.get(ci).map(String::as_str).unwrap_or("")));
                writer.write_record(&line).context("write csv row")?;
            }
        } else {
            writer.write_record(&self.columns).context("write csv header")?;
            for row in &self.rows {
                writer.write_record(row).context("write csv row")?;
            }
        }
        writer.flush().context("flush csv")?;
        Ok(())
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("serialize report json")
    }
}

/// The file name up to its first space, or [`UNKNOWN_DOCUMENT`].
pub fn document_id(file_name: Option<&str>) -> String {
    file_name
        .and_then(|n| n.split(' ').next())
        .filter(|id| !id.is_empty())
        .unwrap_or(UNKNOWN_DOCUMENT)
        .to_string()
}

pub fn reshape(
    extraction: &Extraction,
    consent: Option<Consent>,
    flags: &[Option<NextVisit>],
    document_id: &str,
    options: &ReshapeOptions,
) -> Report {
    let mut report = Report::default();
    let flags = reconcile_flags(&mut report, flags, extraction.visit_count(), options);

    for (i, visit) in extraction.visits().enumerate() {
        if visit.is_blank() {
            report.warn(format!("{document_id}: visit {} has no data, skipped", i + 1));
            continue;
        }
        let mut merged = extraction.base.clone();
        merged.extend_missing(visit);
        merged.set(CONSENT_FIELD, consent.map(|c| c.as_str().to_string()));
        merged.set(NEXT_VISIT_FIELD, flags.get(i).cloned().flatten());
        merged.set(DOCUMENT_ID_FIELD, Some(document_id.to_string()));
        report.rows.push(row_of(&merged));
    }
    tracing::debug!(document = document_id, rows = report.rows.len(), "reshaped");
    report
}

/// Pads or truncates the next-visit flags to one per visit.
fn reconcile_flags(
    report: &mut Report,
    flags: &[Option<NextVisit>],
    visits: usize,
    options: &ReshapeOptions,
) -> Vec<Option<String>> {
    let mut out: Vec<Option<String>> = flags
        .iter()
        .map(|f| f.map(|f| f.as_str().to_string()))
        .collect();
    if out.len() > visits {
        report.warn(format!(
            "found {} next-visit checkbox groups for {visits} visits; using the first {visits}",
            out.len()
        ));
        out.truncate(visits);
    } else if out.len() < visits {
        report.warn(format!(
            "found {} next-visit checkbox groups for {visits} visits; padding with {:?}",
            out.len(),
            options.next_visit_padding
        ));
        out.resize(visits, Some(options.next_visit_padding.clone()));
    }
    out
}

fn row_of(record: &FieldRecord) -> Vec<String> {
    COLUMNS
        .iter()
        .map(|c| record.get(c.source).unwrap_or("").to_string())
        .collect()
}
