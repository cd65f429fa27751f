use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use claim_extract::error::ExtractError;
use claim_extract::pipeline::{PipelineConfig, ReportPipeline};
use claim_extract::progress::ConsoleProgress;
use claim_extract::report::{Report, CONSENT_FIELD, DOCUMENT_ID_FIELD, NEXT_VISIT_FIELD};

fn esc(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn para(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, esc(text))
}

fn table(rows: &[&[&str]]) -> String {
    let mut xml = String::from("<w:tbl>");
    for row in rows {
        xml.push_str("<w:tr>");
        for cell in *row {
            xml.push_str("<w:tc>");
            xml.push_str(&para(cell));
            xml.push_str("</w:tc>");
        }
        xml.push_str("</w:tr>");
    }
    xml.push_str("</w:tbl>");
    xml
}

fn legacy_checkbox(name: &str, checked: Option<&str>) -> String {
    let checked = match checked {
        Some(val) => format!(r#"<w:checked w:val="{val}"/>"#),
        None => "<w:checked/>".to_string(),
    };
    format!(
        r#"<w:r><w:fldChar w:fldCharType="begin"><w:ffData><w:name w:val="{name}"/><w:enabled/><w:checkBox><w:sizeAuto/><w:default w:val="0"/>{checked}</w:checkBox></w:ffData></w:fldChar></w:r>"#
    )
}

/// Marker paragraph followed by three controls; `selected` is the checked one.
fn next_visit(selected: Option<usize>) -> String {
    let boxes: String = (0..3)
        .map(|i| {
            let state = if Some(i) == selected { None } else { Some("0") };
            legacy_checkbox(&format!("Casilla{}", 20 + i), state)
        })
        .collect();
    format!(r#"<w:p><w:r><w:t>Próxima visita:</w:t></w:r>{boxes}</w:p>"#)
}

fn document(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
    )
}

fn package(document_xml: &str) -> Vec<u8> {
    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    zout.start_file("[Content_Types].xml", SimpleFileOptions::default())
        .expect("start file");
    zout.write_all(b"<Types/>").expect("write");
    zout.start_file("word/document.xml", SimpleFileOptions::default())
        .expect("start file");
    zout.write_all(document_xml.as_bytes()).expect("write");
    zout.finish().expect("finish").into_inner()
}

fn report_tables() -> String {
    [
        table(&[&[
            "Compañía: Mutua Sur",
            "Fecha siniestro: 03/01/2023",
            "Fecha visita: 01/02/2023 Dr. Pérez",
        ]]),
        table(&[&["Nombre y apellidos: Ana Ruiz", "NIF: 12345678Z", "Sexo: Mujer"]]),
        table(&[&["Estado civil: Casada"]]),
        table(&[
            &["Tipo", "Fecha ingreso", "Fecha alta", "Nº Historial Clínico"],
            &["Urgencias", "02/01/2023", "04/01/2023", "H-77"],
        ]),
        table(&[&["Códigos", "Diagnóstico"], &["S13.4", "Esguince cervical"]]),
        table(&[&["Muy graves: 0", "Graves: 2", "Moderados: 10", "Básicos: 30"]]),
        table(&[
            &["Código", "Descripción secuela", "Analogía", "Rango", "Prev./Defin.", "Puntuación"],
            &["01003", "Algias postraumáticas", "", "1-5", "Prev.", "3"],
        ]),
        table(&[&["Grado y razonarlo: Leve"]]),
        table(&[&["Ayuda técnica: no"]]),
        table(&[&["Nombre abogado: Luis Gil", "Teléfono: 600111222"]]),
        table(&[&["Muy graves: 0", "Graves: 1"], &["20/03/2023"], &["Sin cambios"]]),
        table(&[&["Código", "Puntuación"], &["01003", "4"]]),
        table(&[&["Notas: ninguna"]]),
    ]
    .concat()
}

fn index_visit() -> String {
    let mut body: String = [
        "Antecedentes médicos del lesionado",
        "Sin interés",
        "Descripción del accidente",
        "Colisión por alcance",
        "Datos asistenciales",
        "Tratamiento y evolución. Exploraciones complementarias",
        "Collarín",
        "Estado actual y exploración física",
        "HISTORIA ACTUAL: cervicalgia",
        "EXPLORACION FISICA: contractura",
        "Pruebas complementarias: RX normal",
        "Relación de causalidad",
        "Criterios cumplidos",
        "Lesiones temporales",
        "Aclaraciones:",
        "Paciente colaborador",
    ]
    .iter()
    .map(|l| para(l))
    .collect();
    body.push_str(&format!(
        "<w:p>{}</w:p><w:p>{}</w:p>",
        legacy_checkbox("Casilla9", Some("0")),
        legacy_checkbox("Casilla9", None)
    ));
    body
}

fn follow_up_visit() -> String {
    [
        "15/03/2023 Consulta",
        "Evolución",
        "Mejoría",
        "Estado actual y exploración física",
        "HISTORIA ACTUAL: leve dolor",
        "EXPLORACION FISICA: mejor",
        "Pruebas complementarias: no",
        "Relación de causalidad",
        "Aclaraciones:",
        "Alta próxima",
    ]
    .iter()
    .map(|l| para(l))
    .collect()
}

fn full_report(closing_marker: bool) -> Vec<u8> {
    let mut body = report_tables();
    body.push_str(&index_visit());
    body.push_str(&next_visit(Some(0)));
    body.push_str(&follow_up_visit());
    if closing_marker {
        body.push_str(&next_visit(Some(1)));
    }
    package(&document(&body))
}

fn pipeline() -> ReportPipeline {
    ReportPipeline::new(PipelineConfig::default(), ConsoleProgress::new(false))
}

fn cell<'a>(report: &'a Report, row: usize, column: &str) -> &'a str {
    let idx = report
        .columns
        .iter()
        .position(|c| c == column)
        .expect("known column");
    &report.rows[row][idx]
}

#[test]
fn full_report_yields_one_row_per_visit() {
    let report = pipeline()
        .process_bytes(&full_report(true), Some("2024-017 Informe pericial.docx"))
        .expect("process");

    assert_eq!(report.rows.len(), 2);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    for row in 0..2 {
        assert_eq!(cell(&report, row, DOCUMENT_ID_FIELD), "2024-017");
        assert_eq!(cell(&report, row, "Compañía"), "Mutua Sur");
        assert_eq!(cell(&report, row, "Nombre y apellidos"), "Ana Ruiz");
        assert_eq!(cell(&report, row, "Diagnóstico"), "Esguince cervical");
        assert_eq!(cell(&report, row, CONSENT_FIELD), "SI");
    }

    assert_eq!(cell(&report, 0, "Fecha visita"), "01/02/2023");
    assert_eq!(cell(&report, 0, "Nombre del Doctor"), "Dr. Pérez");
    assert_eq!(cell(&report, 0, "Hora"), "");
    assert_eq!(cell(&report, 0, "Estado civil"), "Casada");
    assert_eq!(cell(&report, 0, "Fecha alta"), "04/01/2023");

    assert_eq!(cell(&report, 0, "Antecedentes médicos del lesionado"), "Sin interés");
    assert_eq!(cell(&report, 0, "Descripción del accidente"), "Colisión por alcance");
    assert_eq!(cell(&report, 0, "Tratamiento y evolución - processed"), "Collarín");
    assert_eq!(cell(&report, 0, "HISTORIA ACTUAL"), "cervicalgia");
    assert_eq!(cell(&report, 0, "EXPLORACION FISICA"), "contractura");
    assert_eq!(cell(&report, 0, "Pruebas complementarias"), "RX normal");
    assert_eq!(cell(&report, 0, "Relación de causalidad"), "Criterios cumplidos");
    assert_eq!(cell(&report, 0, "Intervenciones quirúrgicas"), "-");
    assert_eq!(cell(&report, 0, "Aclaraciones"), "Paciente colaborador");
    assert_eq!(cell(&report, 0, "Lesiones graves"), "2");
    assert_eq!(cell(&report, 0, "Codigo Secuela"), "01003");
    assert_eq!(cell(&report, 0, "puntuación secuela"), "3");
    assert_eq!(cell(&report, 0, "Perdida c vida: Grado y razonarlo"), "Leve");
    assert_eq!(cell(&report, 0, "Nombre abogado"), "Luis Gil");
    assert_eq!(cell(&report, 0, "Telefono abogado"), "600111222");
    assert_eq!(cell(&report, 0, NEXT_VISIT_FIELD), "Seguimiento");

    assert_eq!(cell(&report, 1, "Fecha de consulta extra"), "15/03/2023");
    assert_eq!(cell(&report, 1, "Tratamiento y evolución - processed"), "Mejoría");
    assert_eq!(cell(&report, 1, "HISTORIA ACTUAL"), "leve dolor");
    assert_eq!(cell(&report, 1, "EXPLORACION FISICA"), "mejor");
    assert_eq!(cell(&report, 1, "Pruebas complementarias"), "no");
    assert_eq!(cell(&report, 1, "Aclaraciones"), "Alta próxima");
    assert_eq!(cell(&report, 1, "Lesiones graves"), "1");
    assert_eq!(cell(&report, 1, "Motivos variacion fecha final"), "Sin cambios");
    assert_eq!(cell(&report, 1, "puntuación secuela"), "4");
    assert_eq!(cell(&report, 1, NEXT_VISIT_FIELD), "Final");
}

#[test]
fn missing_checkbox_group_is_padded() {
    let report = pipeline()
        .process_bytes(&full_report(false), Some("77 informe.docx"))
        .expect("process");
    assert_eq!(report.rows.len(), 2);
    assert_eq!(cell(&report, 0, NEXT_VISIT_FIELD), "Seguimiento");
    assert_eq!(cell(&report, 1, NEXT_VISIT_FIELD), "NO");
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("padding"));
}

#[test]
fn short_template_still_produces_a_row() {
    let body = [
        table(&[&["Compañía: Mutua Sur"]]),
        table(&[&["NIF: 12345678Z"]]),
    ]
    .concat();
    let report = pipeline()
        .process_bytes(&package(&document(&body)), None)
        .expect("process");

    assert_eq!(report.rows.len(), 1);
    assert_eq!(cell(&report, 0, DOCUMENT_ID_FIELD), "Unknown");
    assert_eq!(cell(&report, 0, "Compañía"), "Mutua Sur");
    assert_eq!(cell(&report, 0, "Fecha siniestro"), "");
    assert_eq!(cell(&report, 0, "NIF"), "12345678Z");
    assert_eq!(cell(&report, 0, "Estado civil"), "-");
    assert_eq!(cell(&report, 0, "Diagnóstico"), "-");
    assert_eq!(cell(&report, 0, CONSENT_FIELD), "");
    assert_eq!(cell(&report, 0, NEXT_VISIT_FIELD), "NO");
}

#[test]
fn package_without_document_part_is_an_error() {
    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    zout.start_file("word/styles.xml", SimpleFileOptions::default())
        .expect("start file");
    zout.write_all(b"<w:styles/>").expect("write");
    let bytes = zout.finish().expect("finish").into_inner();

    match pipeline().process_bytes(&bytes, Some("1 x.docx")) {
        Err(ExtractError::MissingPart(part)) => assert_eq!(part, "word/document.xml"),
        other => panic!("unexpected: {:?}", other.map(|r| r.rows.len())),
    }
}

#[test]
fn malformed_document_markup_is_an_error() {
    let bytes = package("<w:document><w:body><w:p></w:body>");
    assert!(matches!(
        pipeline().process_bytes(&bytes, None),
        Err(ExtractError::MalformedMarkup { .. })
    ));
}

#[test]
fn truncated_document_keeps_tables_and_warns() {
    let full = document(&report_tables());
    let cut = &full[..full.find("Dr. P").expect("doctor text")];
    let report = pipeline()
        .process_bytes(&package(cut), Some("5 cortado.docx"))
        .expect("process");

    assert_eq!(report.rows.len(), 1);
    assert_eq!(cell(&report, 0, "Compañía"), "Mutua Sur");
    assert_eq!(cell(&report, 0, "Fecha siniestro"), "03/01/2023");
    assert_eq!(cell(&report, 0, "Fecha visita"), "01/02/2023");
    assert_eq!(cell(&report, 0, "Nombre y apellidos"), "-");
    assert_eq!(cell(&report, 0, CONSENT_FIELD), "");
    assert!(report.warnings.iter().any(|w| w.contains("consent field unreadable")));
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("next-visit checkboxes unreadable")));
}

#[test]
fn batch_skips_unreadable_inputs_and_writes_csv() {
    let dir = std::env::temp_dir().join(format!("claim-extract-batch-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("mkdir");
    let good = dir.join("31 primera.docx");
    std::fs::write(&good, full_report(true)).expect("write docx");
    let missing = dir.join("32 ausente.docx");

    let report = pipeline()
        .process_all(&[good, missing])
        .expect("batch");
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("32 ausente.docx"));

    let mut csv = Vec::new();
    report.write_csv(&mut csv, true).expect("csv");
    let csv = String::from_utf8(csv).expect("utf8");
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("Campo,Visita 1,Visita 2"));
    assert_eq!(lines.next(), Some("Numero de documento,31,31"));

    let _ = std::fs::remove_dir_all(&dir);
}
