// Entry point and console flow.
//
// - Option [1] reads the uploads (paths on the command line, or every file
//   in `./uploads`) and prints what was loaded.
// - Option [2] builds all reports, writes them as CSV/JSON and shows short
//   previews; afterwards the user can go back to the menu or exit.
use feibra_report::aggregate::{aggregate, value_counts, Dimension, Mode, RowOrder};
use feibra_report::config::Role;
use feibra_report::filter::RecordFilter;
use feibra_report::loader::UploadedFile;
use feibra_report::session::Session;
use feibra_report::types::{ControlTable, Outcome, ReconciledRecord};
use feibra_report::{branches, logging, output, reconcile, reports, tags, util, Config};
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

const CONFIG_FILE: &str = "feibra.toml";
const UPLOAD_DIR: &str = "uploads";
const EXPORT_DIR: &str = "export";

// Parsed uploads survive between menu choices; re-loading an unchanged file
// set is served from the session memo.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState::default()));

#[derive(Default)]
struct AppState {
    config: Config,
    session: Session,
}

fn state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_choice() -> String {
    print!("Auswahl: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Returns `true` if the user chose `J`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Zurück zur Auswahl (J/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf).ok();
        match buf.trim().to_uppercase().as_str() {
            "J" => return true,
            "N" => return false,
            _ => println!("Ungültige Eingabe. Bitte J oder N eingeben."),
        }
    }
}

fn upload_paths() -> Vec<PathBuf> {
    let args: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if !args.is_empty() {
        return args;
    }
    let mut paths: Vec<PathBuf> = match std::fs::read_dir(UPLOAD_DIR) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).filter(|p| p.is_file()).collect(),
        Err(e) => {
            eprintln!("Ordner '{}' nicht lesbar: {}", UPLOAD_DIR, e);
            Vec::new()
        }
    };
    paths.sort();
    paths
}

fn handle_load() {
    let mut files = Vec::new();
    for path in upload_paths() {
        match UploadedFile::from_path(&path) {
            Ok(f) => files.push(f),
            Err(e) => eprintln!("Datei {} nicht lesbar: {}", path.display(), e),
        }
    }
    if files.is_empty() {
        println!("Keine Dateien gefunden. Bitte XLSX- oder CSV-Dateien angeben.\n");
        return;
    }

    let mut guard = state();
    let AppState { config, session } = &mut *guard;
    let batch = session.load(&files, config);
    for err in &batch.errors {
        eprintln!("Fehler in {}: {}", err.file, err.error);
    }
    let r = &batch.report;
    println!(
        "{} Dateien gelesen ({} fehlerhaft), {} Kontrollen geladen.",
        util::format_int(r.files_read),
        util::format_int(r.files_failed),
        util::format_int(r.regular_rows)
    );
    println!(
        "Hinweis: {} Zeilen der Filiale {} entfernt, {} Kontrollen als PERF. NICHT_OK eingestuft.",
        util::format_int(r.dropped_excluded_branch),
        config.excluded_branch,
        util::format_int(r.reclassified)
    );
    if r.unparsable_timestamps > 0 {
        println!("Hinweis: {} Zeitstempel nicht lesbar.", util::format_int(r.unparsable_timestamps));
    }
    println!(
        "SOLL/IST-Tabellen: {}, Monatsberichte: {}\n",
        r.special_tables, r.monthly_tables
    );
}

fn report_error<T>(result: feibra_report::Result<T>) {
    if let Err(e) = result {
        eprintln!("Schreibfehler: {}", e);
    }
}

fn print_distributor_detail(table: &ControlTable, distributor: &str) {
    let detail = reports::distributor_detail(&table.records, distributor);
    println!(
        "Tagesverlauf {}: {} Kontrollen, {} OK, {} NICHT_OK",
        detail.distributor,
        util::format_int(detail.total),
        util::format_int(detail.ok),
        util::format_int(detail.not_ok)
    );
    for day in detail.days.iter().take(7) {
        let date = day.date.map(|d| d.format("%d.%m.%Y").to_string()).unwrap_or_else(|| "ohne Datum".to_string());
        println!("  {}: OK {}, NICHT_OK {}, PERF. NICHT_OK {}", date, day.ok, day.not_ok, day.perf_not_ok);
    }
    println!();
}

fn print_role_benchmark(reconciled: &[ReconciledRecord], config: &Config) {
    for role in [Role::Regionalleiter, Role::Filialleiter, Role::Gebietsbetreuer] {
        let subset: Vec<ReconciledRecord> =
            reports::filter_by_role(reconciled, role, config).into_iter().cloned().collect();
        if subset.is_empty() {
            continue;
        }
        println!("Benchmark {:?}", role);
        output::preview_table_rows(&reconcile::to_rows(&subset, config), 5);
    }
    let without_role = reconciled
        .iter()
        .filter(|r| r.name.as_deref().and_then(|n| config.roles.role_of(n)).is_none())
        .count();
    println!("Erfasser ohne Rolle: {}\n", util::format_int(without_role));
}

fn handle_generate_reports() {
    let guard = state();
    let config = &guard.config;
    let Some(batch) = guard.session.batch() else {
        println!("Fehler: Keine Daten geladen. Bitte zuerst Dateien laden (Option 1).\n");
        return;
    };

    println!("Auswertungen werden erstellt...\n");

    if let Some(table) = &batch.regular {
        println!("Kontrollen gesamt: {}", util::format_int(table.len()));
        if let Some(avg) = reports::avg_controls_per_day(&table.records) {
            println!("Durchschnittl. Kontrollen pro Tag: {}", util::format_number(avg, 2));
        }
        for (value, count) in value_counts(&table.records, |r| r.outcome.as_ref().map(|o| o.to_string())) {
            println!("  {}: {}", value, util::format_int(count));
        }
        println!();

        let by_branch = aggregate(&table.records, Dimension::Branch, Mode::Count, RowOrder::Default);
        report_error(output::write_pivot_csv("auswertung_filialen.csv", &by_branch));
        println!("Kontrollen pro Filiale");
        output::preview_pivot(&by_branch, 12);

        let (by_area, _) = branches::reassign_by_area(table, config);
        let area_pivot = aggregate(&by_area.records, Dimension::Branch, Mode::Percentage, RowOrder::Default);
        report_error(output::write_pivot_csv("auswertung_filialen_plz.csv", &area_pivot));
        println!("Kontrollergebnis in % pro Filiale (nach PLZ)");
        output::preview_pivot(&area_pivot, 12);

        let (by_person, _) = branches::reassign_by_recorder(table, config);
        let person_pivot =
            aggregate(&by_person.records, Dimension::RecorderWithBranch, Mode::Percentage, RowOrder::Default);
        report_error(output::write_pivot_csv("auswertung_erfasser.csv", &person_pivot));
        println!("Kontrollergebnis in % pro Erfasser");
        output::preview_pivot(&person_pivot, 5);

        let tag_rows = tags::tag_counts(&tags::split_performance_tags(table, config));
        report_error(output::write_csv("verteilerperformance.csv", &tag_rows));
        println!("Verteilerperformance (Zusatzinfos)");
        output::preview_table_rows(&tag_rows, 5);

        let distributor_rows = reports::distributor_stats(&table.records);
        report_error(output::write_csv("kontrollen_pro_verteiler.csv", &distributor_rows));
        println!("Kontrollen pro Verteiler");
        output::preview_table_rows(&distributor_rows, 5);
        if let Some(busiest) = distributor_rows.iter().max_by_key(|r| r.controls) {
            print_distributor_detail(table, &busiest.distributor);
        }

        let performance = RecordFilter { outcomes: vec![Outcome::PerfNotOk], ..Default::default() };
        let fault_view = performance.apply(table);
        let fault_pivot = aggregate(
            &fault_view.records,
            Dimension::DistributorWithBranch,
            Mode::Count,
            RowOrder::for_filter(&performance),
        );
        println!("PERF. NICHT_OK pro Verteiler ({} Kontrollen)", util::format_int(fault_view.len()));
        output::preview_pivot(&fault_pivot, 5);

        let today = chrono::Local::now().date_naive();
        match output::export_monthly(EXPORT_DIR, today, table, &by_branch) {
            Ok(files) => println!("Monatsexport: {}, {}\n", files.raw.display(), files.summary.display()),
            Err(e) => eprintln!("Exportfehler: {}", e),
        }
    }

    let reconciled = reconcile::reconcile_all(&batch.special, config);
    if !reconciled.is_empty() {
        let rows = reconcile::to_rows(&reconciled, config);
        report_error(output::write_csv("soll_ist.csv", &rows));
        println!("SOLL/IST pro Erfasser");
        output::preview_table_rows(&rows, 5);

        let branch_rows = reports::branch_target_summary(&reconciled, config);
        report_error(output::write_csv("soll_ist_filialen.csv", &branch_rows));
        println!("Benchmark pro Filiale");
        output::preview_table_rows(&branch_rows, 12);

        print_role_benchmark(&reconciled, config);
    }

    let monthly = reports::monthly_summary(&batch.monthly);
    if !monthly.is_empty() {
        println!("Monatsberichte");
        output::preview_table_rows(&monthly, monthly.len());
    }

    let summary = reports::generate_summary(batch.regular.as_ref(), &reconciled, batch.special.len());
    report_error(output::write_json("summary.json", &summary));
    println!("Zusammenfassung (summary.json):");
    println!(
        "{{\"kontrollen\": {}, \"perf_nicht_ok\": {}, \"ist\": {}, \"soll\": {}}}\n",
        util::format_int(summary.total_controls),
        util::format_int(summary.fault_controls),
        util::format_number(summary.total_actual, 0),
        util::format_number(summary.total_target, 0)
    );
}

fn main() {
    logging::init_tracing_subscriber("feibra_report");
    match Config::load_or_default(CONFIG_FILE) {
        Ok(config) => state().config = config,
        Err(e) => {
            eprintln!("Konfiguration {} fehlerhaft: {}", CONFIG_FILE, e);
            return;
        }
    }

    loop {
        println!("Datenanalyse Tool");
        println!("[1] Dateien laden");
        println!("[2] Auswertungen erstellen\n");
        match read_choice().as_str() {
            "1" => handle_load(),
            "2" => {
                println!();
                handle_generate_reports();
                if !prompt_back_to_menu() {
                    println!("Programm wird beendet.");
                    break;
                }
            }
            _ => println!("Ungültige Auswahl. Bitte 1 oder 2 eingeben.\n"),
        }
    }
}
