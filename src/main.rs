#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use aes_gcm::aead::{rand_core::RngCore, Aead, OsRng};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::Local;
use log::{info, warn};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tauri::{AppHandle, Manager, Window};
use tauri_plugin_clipboard_manager::ClipboardExt;
use tauri_plugin_opener::OpenerExt;

const USERS_FILE: &str = "users.json";
const PROJECTS_FILE: &str = "projects.json";
const INSPECTIONS_FILE: &str = "inspections.json";
const TEMPLATES_FILE: &str = "checklist_templates.json";
const REPORTS_DIR: &str = "reports";
const DEFAULT_PBKDF2_ITERATIONS: u32 = 200_000;
const BACKUP_VERSION: u8 = 1;
const SEED_DEFECT_ROWS: usize = 5;
const SUPER_ADMIN_ID: &str = "admin";
const SUPER_ADMIN_SECRET: &str = "qngkgk78";
const PANEL_LINK_SCHEME: &str = "qms://inspection";

const EXPORT_COLUMNS: [&str; 13] = [
    "Project",
    "Task",
    "Panel",
    "Type",
    "Result",
    "Inspector",
    "Date",
    "OK",
    "NG",
    "N/A",
    "Pending",
    "QC Signed",
    "Defects",
];

// Master checklists transcribed from the plant's inspection certificate
// sheets. Order drives the grouped-row rendering in the form view.
const PROCESS_MASTER: [(&str, &str, &str, &str); 38] = [
    // 1. 마킹
    (
        "마킹",
        "순차",
        "외함상태(도어사양, 도장사양) 확인",
        "전기설계통지(구조,일반사항)",
    ),
    ("마킹", "자주", "마킹 표시 흔적(연필 등) 제거 확인", "LSAE-P1-187R9"),
    ("마킹", "순차", "Cable hole COVER 사양 확인", "전기설계통지(구조)"),
    (
        "마킹",
        "자주",
        "DUCT 취부상태(수평,수직,마감,리벳작업) 확인",
        "LSAE-P1-166R12,-188R9,-196R9",
    ),
    // 2. 기기취부
    ("기기취부", "순차", "주기기 사양 확인", "전기설계통지(주기기)"),
    ("기기취부", "자주", "주기기 조임후 1 point 매직체크 확인", "LSAE-P1-210R17"),
    (
        "기기취부",
        "순차",
        "접지 CABLE 사양(사이즈,종류,색상) 확인",
        "전기설계통지(주회로)",
    ),
    ("기기취부", "자주", "접지 CABLE 작업후 매직체크 확인", "LSAE-P1-230R17"),
    ("기기취부", "순차", "주기기 접지 조임상태 확인", "LSAE-P1-230R17"),
    ("기기취부", "자주", "취부상태(수평,수직,SCREW조임)", "LSAE-P1-211R11"),
    ("기기취부", "순차", "DOOR 상, 하 바뀜 확인", "외형도"),
    ("기기취부", "자주", "DOOR기기 사양 확인", "외형도, 삼선도"),
    ("기기취부", "자주", "명판 내용은 도면과 일치 (각인,오타,누락 등)", "외형도"),
    // 3. 배선조립
    (
        "배선조립",
        "순차",
        "기기판 기기배치/배선정렬 상태 확인",
        "배선전개도, LSAE-P1-200R8",
    ),
    ("배선조립", "자주", "전선보호 HOOK BAND 상태 확인", "LSAE-P1-173R6"),
    ("배선조립", "순차", "PT 1차 접지선 사이즈 확인", "전기설계통지(주회로)"),
    ("배선조립", "자주", "CT 극성 확인", "전기설계통지(주기기)"),
    (
        "배선조립",
        "순차",
        "기기판 기기조임상태 및 주요기기(AUX-RY) 오결선 확인",
        "LSAE-P1-203R7, 삼선도",
    ),
    ("배선조립", "자주", "기기압착단자 및 배선 조임 확인", "LSAE-P1-332R8, -201R8"),
    ("배선조립", "순차", "DOOR기기 간섭여부 확인", "외형도"),
    ("배선조립", "자주", "DOOR기기 배선정렬상태 확인", "LSAE-P1-401R4~-410R4"),
    // 4. 도체조립
    (
        "도체조립",
        "순차",
        "BUS-BAR 상배열 상태 확인\n-TUBE사양 확인\n-수평/수직절연거리 및 열반부스바(애자포함) 위치치수 확인",
        "전기설계통지(주회로)\nLSAE-P1-220R2, 구조조립도면",
    ),
    (
        "도체조립",
        "순차",
        "BOLT규격 확인\n-BOLT조임 확인",
        "동체도면, LSAE-P1-237R8\nLSAE-P1-233R19",
    ),
    (
        "도체조립",
        "자주",
        "BOLT조임 확인 (Torque Check)",
        "BOLT규격(강도 8.8)별 표준범위 확인",
    ),
    ("도체조립", "순차", "접지BUS-BAR 사양확인", "전기설계통지(주회로)"),
    ("도체조립", "자주", "접지볼트체결 상태(매직체크) 확인", "LSAE-P1-239R7"),
    ("도체조립", "순차", "BOLT규격 확인 (애자)", "동체도면, LSAE-P1-237R8"),
    ("도체조립", "자주", "BOLT조임 확인 (애자)", "LSAE-P1-234R24"),
    // 5. 총조립
    ("총조립", "순차", "CABLE 사양 확인(전선의 종류)", "전기설계통지(주회로)"),
    ("총조립", "자주", "BOLT 조임, 매직 CHECK", "LSAE-P1-454R0"),
    ("총조립", "순차", "접속부 볼트 청색 매직체크 확인", "LSAE-P1-233R19"),
    ("총조립", "자주", "접속부 볼트 조임 검사 및 적색 매직체크 확인", "-"),
    ("총조립", "자주", "재질, 색상, 치수등 (도면과 일치)", "LSAE-P1-260R7"),
    (
        "총조립",
        "자주",
        "상 스티카 및 경고/위험라벨 부착 확인",
        "LSAE-P1-238R8, -345R4, -241R10, -570R0",
    ),
    ("총조립", "자주", "BUS실 격벽판 취부 확인", "외함구조도면"),
    ("총조립", "자주", "차단기 사양 확인", "전기설계통지(주기기)"),
    ("총조립", "순차", "차단기/대차 클립 및 접지 SLIDING부 확인", "-"),
    ("총조립", "자주", "청소 및 열반BUS 확인", "외형도, 구조도, 동체도"),
];

const FINAL_MASTER: [(&str, &str, &str, &str); 12] = [
    (
        "일반",
        "-",
        "기계/기구 사양 및 취부 상태(위치등) 확인",
        "승인 도면과 일치 여부 확인(삼선도에 주기기 사양 확인 및 Serial No.표기 한다.-CT사양필)",
    ),
    (
        "일반",
        "-",
        "내, 외부 기기류 외관 확인 (명판 포함)",
        "기기류 파손, 오염 등 외관 확인\n기기류 명판 및 스티커 부착 확인",
    ),
    ("일반", "-", "변성기류 및 애자 표면의 상태 확인", "표면의 손상 및 이물질 확인"),
    (
        "일반",
        "-",
        "내/외부 부품의 외관 점검\n(단자대, Aux Relay, S/W등)",
        "외관 손상 및 명판 확인",
    ),
    (
        "일반",
        "-",
        "단자대(TB)의 체결상태 및 식별표시 확인",
        "체결된 배선의 흔들림 확인 및 하트마크 기기(T/B)번호의 정면 위치 확인",
    ),
    ("일반", "-", "차단기 CLIP 삽입 상태", "CLIP이탈여부 확인(육안점검)"),
    (
        "일반",
        "-",
        "배전반 외함 접지 및 부품 접지 확인",
        "접지 전선 규격 및 볼트 고정 상태 (I Marking 확인)",
    ),
    (
        "외관\n구조",
        "볼트 체결\n상태",
        "볼트 조임 토크 확인\n- 작업자: (성명)",
        "•조임전 절연거리를 확인 한다.\n•볼트(강도8.8) 규격별 조임 토크 기준(kgf.cm)\nM6(70~100), M8(200~245), M10(350~490), M12(600~850)\n•조임Torque값은 Bolt Torque Check Sheet 에 기록한다.",
    ),
    (
        "외관\n구조",
        "치수",
        "배전반 외함 Size 도면 일치",
        "외함 Size 치수 확인(치수 확인후 외형도에 확인 치수값을 표기 기록 한다. )",
    ),
    (
        "외관\n구조",
        "부스바\n조립\n상태",
        "외관 상태 확인",
        "스크래치, 줄무늬, 찍힘, 오염, 변색 등 확인\n튜브 절단 부위 도금 상태 확인\n부스바 수평 일치 여부 확인",
    ),
    (
        "외관\n구조",
        "배선",
        "단자대 및 Cable 결선 상태 확인",
        "TB 볼트 조임 상태 확인\n케이블 결선 확인 (단선, 오결선 등)",
    ),
    (
        "기계적 동작시험",
        "-",
        "기계적 수동 동작 확인",
        "차단기, 개폐기의 ON/OFF 수동 동작 확인\n차단기, PT 대차 등 인입 및 인출 동작 확인",
    ),
];

// --- Domain model ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum InspectionType {
    #[serde(rename = "process")]
    Process,
    #[serde(rename = "final")]
    Final,
}

impl InspectionType {
    fn as_str(self) -> &'static str {
        match self {
            InspectionType::Process => "process",
            InspectionType::Final => "final",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
enum ItemStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "NG")]
    Ng,
    #[serde(rename = "N/A")]
    NotApplicable,
    #[serde(rename = "pending")]
    #[default]
    Pending,
}

impl ItemStatus {
    fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Ok => "OK",
            ItemStatus::Ng => "NG",
            ItemStatus::NotApplicable => "N/A",
            ItemStatus::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
enum InspectionResult {
    #[serde(rename = "pass")]
    Pass,
    #[serde(rename = "fail")]
    Fail,
    #[serde(rename = "pending")]
    #[default]
    Pending,
}

impl InspectionResult {
    fn as_str(self) -> &'static str {
        match self {
            InspectionResult::Pass => "pass",
            InspectionResult::Fail => "fail",
            InspectionResult::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum UserRole {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "manager")]
    Manager,
    #[serde(rename = "inspector")]
    Inspector,
    #[serde(rename = "worker")]
    Worker,
    #[serde(rename = "customer")]
    Customer,
    #[serde(rename = "production-leader")]
    ProductionLeader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
enum DefectCategory {
    #[serde(rename = "enclosure")]
    #[default]
    Enclosure,
    #[serde(rename = "system")]
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
enum ProjectStatus {
    #[serde(rename = "planning")]
    #[default]
    Planning,
    #[serde(rename = "production")]
    Production,
    #[serde(rename = "completed")]
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
enum AccountStatus {
    #[serde(rename = "active")]
    #[default]
    Active,
    #[serde(rename = "inactive")]
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChecklistMasterItem {
    #[serde(default)]
    category: String,
    #[serde(default)]
    sub_category: String,
    item: String,
    #[serde(default)]
    criteria: String,
}

/// One checklist line inside a form session or a saved record. The `item`
/// text doubles as the merge key, so template authors must keep it stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChecklistEntry {
    #[serde(default)]
    category: String,
    #[serde(default)]
    sub_category: String,
    item: String,
    #[serde(default)]
    criteria: String,
    #[serde(default)]
    status: ItemStatus,
    #[serde(default)]
    value: String,
    #[serde(default)]
    inspector: String,
    #[serde(default)]
    inspection_date: String,
    #[serde(default)]
    qc_inspector: String,
    #[serde(default)]
    qc_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectionDefect {
    id: String,
    #[serde(default)]
    category: DefectCategory,
    #[serde(default)]
    content: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    writer: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    action_date: String,
    #[serde(default)]
    action_by: String,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    verified_date: String,
    #[serde(default)]
    verified_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectionRecord {
    id: String,
    project_id: String,
    task_number: String,
    panel_id: u32,
    #[serde(rename = "type")]
    kind: InspectionType,
    result: InspectionResult,
    #[serde(default)]
    inspector: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    check_list: Vec<ChecklistEntry>,
    #[serde(default)]
    defect_list: Vec<InspectionDefect>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Project {
    id: String,
    name: String,
    #[serde(default)]
    client: String,
    task_number: String,
    panel_count: u32,
    #[serde(default)]
    color: String,
    #[serde(default)]
    spec: String,
    #[serde(default)]
    model_type: String,
    #[serde(default)]
    deadline: String,
    #[serde(default)]
    remarks: String,
    #[serde(default)]
    status: ProjectStatus,
    #[serde(default)]
    start_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    id: String,
    name: String,
    role: UserRole,
    #[serde(default)]
    department: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    status: AccountStatus,
    #[serde(default)]
    joined_date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    password: String,
}

/// Acting user passed explicitly with every state-mutating operation, so the
/// core stays pure and stamping never reads ambient session state.
#[derive(Debug, Clone, Deserialize)]
struct ActingUser {
    name: String,
    role: UserRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct Capabilities {
    can_edit_checklist: bool,
    can_sign_qc: bool,
    can_complete_defect: bool,
    can_verify_defect: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CellColor {
    White,
    Orange,
    Green,
    Red,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct TemplateStore {
    #[serde(default)]
    process: Vec<ChecklistMasterItem>,
    #[serde(default, rename = "final")]
    final_: Vec<ChecklistMasterItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupBundle {
    #[serde(default)]
    version: u8,
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    inspections: Vec<InspectionRecord>,
    #[serde(default)]
    templates: TemplateStore,
}

#[derive(Serialize, Deserialize)]
struct CryptoEnvelope {
    v: u8,
    salt: String,
    iv: String,
    tag: String,
    data: String,
}

// --- Capability resolution ---

fn capabilities_for(role: UserRole, kind: InspectionType) -> Capabilities {
    // Process statuses are entered on the line by workers and countersigned
    // by QC; final statuses are entered by the reviewing side directly.
    let can_edit_checklist = match kind {
        InspectionType::Process => role == UserRole::Worker,
        InspectionType::Final => !matches!(role, UserRole::Worker | UserRole::Customer),
    };
    let reviewer = matches!(
        role,
        UserRole::Admin | UserRole::Manager | UserRole::Inspector | UserRole::ProductionLeader
    );
    Capabilities {
        can_edit_checklist,
        can_sign_qc: reviewer && kind == InspectionType::Process,
        can_complete_defect: reviewer || role == UserRole::Worker,
        can_verify_defect: reviewer,
    }
}

// --- Checklist merge engine ---

fn blank_entry(master: &ChecklistMasterItem) -> ChecklistEntry {
    ChecklistEntry {
        category: master.category.clone(),
        sub_category: master.sub_category.clone(),
        item: master.item.clone(),
        criteria: master.criteria.clone(),
        status: ItemStatus::Pending,
        value: String::new(),
        inspector: String::new(),
        inspection_date: String::new(),
        qc_inspector: String::new(),
        qc_date: String::new(),
    }
}

/// Master-driven left join keyed on the item text. Labels always come fresh
/// from the master; saved answers for items no longer in the template are
/// dropped from the merged view and overwritten on the next save.
fn merge_checklist(
    master: &[ChecklistMasterItem],
    existing: Option<&InspectionRecord>,
) -> Vec<ChecklistEntry> {
    master
        .iter()
        .map(|m| {
            let saved =
                existing.and_then(|record| record.check_list.iter().find(|e| e.item == m.item));
            match saved {
                Some(prev) => ChecklistEntry {
                    category: m.category.clone(),
                    sub_category: m.sub_category.clone(),
                    item: m.item.clone(),
                    criteria: m.criteria.clone(),
                    status: prev.status,
                    value: prev.value.clone(),
                    inspector: prev.inspector.clone(),
                    inspection_date: prev.inspection_date.clone(),
                    qc_inspector: prev.qc_inspector.clone(),
                    qc_date: prev.qc_date.clone(),
                },
                None => blank_entry(m),
            }
        })
        .collect()
}

// --- Verdict calculator ---

/// Derives the overall form verdict. N/A lines never block completion, an
/// all-N/A checklist can never auto-pass, and `fail` is never produced here;
/// a stored `fail` can only be carried over from an earlier save.
fn compute_verdict(entries: &[ChecklistEntry], kind: InspectionType) -> InspectionResult {
    let applicable: Vec<&ChecklistEntry> = entries
        .iter()
        .filter(|entry| entry.status != ItemStatus::NotApplicable)
        .collect();
    if applicable.is_empty() {
        return InspectionResult::Pending;
    }
    let satisfied = match kind {
        InspectionType::Process => applicable.iter().all(|entry| !entry.qc_inspector.is_empty()),
        InspectionType::Final => applicable.iter().all(|entry| entry.status == ItemStatus::Ok),
    };
    if satisfied {
        InspectionResult::Pass
    } else {
        InspectionResult::Pending
    }
}

fn effective_result(record: &InspectionRecord) -> InspectionResult {
    if record.result == InspectionResult::Fail {
        return InspectionResult::Fail;
    }
    compute_verdict(&record.check_list, record.kind)
}

fn color_for(record: Option<&InspectionRecord>, kind: InspectionType) -> CellColor {
    let Some(record) = record else {
        return CellColor::White;
    };
    if record.result == InspectionResult::Fail {
        return CellColor::Red;
    }
    match compute_verdict(&record.check_list, kind) {
        InspectionResult::Pass => CellColor::Green,
        _ => CellColor::Orange,
    }
}

// --- Checklist status-entry state machine ---

/// Clicking the entry's current status reverts it to pending; any other
/// status sets it and stamps the acting user. Every transition invalidates
/// the existing QC countersignature. Returns false when nothing changed.
fn apply_status(
    entries: &mut [ChecklistEntry],
    index: usize,
    status: ItemStatus,
    user: &ActingUser,
    kind: InspectionType,
    today: &str,
) -> bool {
    if status == ItemStatus::Pending {
        return false;
    }
    if !capabilities_for(user.role, kind).can_edit_checklist {
        return false;
    }
    let Some(entry) = entries.get_mut(index) else {
        return false;
    };
    if entry.status == status {
        entry.status = ItemStatus::Pending;
        entry.inspector.clear();
        entry.inspection_date.clear();
    } else {
        entry.status = status;
        entry.inspector = user.name.clone();
        entry.inspection_date = today.to_string();
    }
    entry.qc_inspector.clear();
    entry.qc_date.clear();
    true
}

/// QC sign-off toggle. Only reviewer roles may countersign, and only lines
/// that already carry a worker result; unchecking clears the stamp.
fn toggle_qc(
    entries: &mut [ChecklistEntry],
    index: usize,
    user: &ActingUser,
    kind: InspectionType,
    today: &str,
) -> bool {
    if !capabilities_for(user.role, kind).can_sign_qc {
        return false;
    }
    let Some(entry) = entries.get_mut(index) else {
        return false;
    };
    if entry.status == ItemStatus::Pending {
        return false;
    }
    if entry.qc_inspector.is_empty() {
        entry.qc_inspector = user.name.clone();
        entry.qc_date = today.to_string();
    } else {
        entry.qc_inspector.clear();
        entry.qc_date.clear();
    }
    true
}

// --- Defect ledger ---

fn blank_defect_row() -> InspectionDefect {
    InspectionDefect {
        id: new_id(),
        category: DefectCategory::Enclosure,
        content: String::new(),
        date: String::new(),
        writer: String::new(),
        completed: false,
        action_date: String::new(),
        action_by: String::new(),
        verified: false,
        verified_date: String::new(),
        verified_by: String::new(),
    }
}

fn seeded_defect_rows(existing: &[InspectionDefect]) -> Vec<InspectionDefect> {
    let mut rows = existing.to_vec();
    while rows.len() < SEED_DEFECT_ROWS {
        rows.push(blank_defect_row());
    }
    rows
}

fn defect_write_content(
    rows: &mut [InspectionDefect],
    index: usize,
    content: &str,
    user: &ActingUser,
    today: &str,
) -> bool {
    let Some(row) = rows.get_mut(index) else {
        return false;
    };
    let was_blank = row.content.trim().is_empty();
    row.content = content.to_string();
    if row.content.trim().is_empty() {
        row.date.clear();
        row.writer.clear();
    } else if was_blank {
        row.date = today.to_string();
        row.writer = user.name.clone();
    }
    true
}

fn defect_write_category(
    rows: &mut [InspectionDefect],
    index: usize,
    category: DefectCategory,
) -> bool {
    let Some(row) = rows.get_mut(index) else {
        return false;
    };
    row.category = category;
    true
}

/// Worker-side completion flip. A blank row cannot be completed; unchecking
/// clears the action stamp and withdraws any verification that relied on it.
fn defect_flip_completed(
    rows: &mut [InspectionDefect],
    index: usize,
    user: &ActingUser,
    kind: InspectionType,
    today: &str,
) -> bool {
    if !capabilities_for(user.role, kind).can_complete_defect {
        return false;
    }
    let Some(row) = rows.get_mut(index) else {
        return false;
    };
    if row.content.trim().is_empty() {
        return false;
    }
    if row.completed {
        row.completed = false;
        row.action_date.clear();
        row.action_by.clear();
        row.verified = false;
        row.verified_date.clear();
        row.verified_by.clear();
    } else {
        row.completed = true;
        row.action_date = today.to_string();
        row.action_by = user.name.clone();
    }
    true
}

/// Responsible-party verification flip, only reachable once the worker has
/// marked the row completed.
fn defect_flip_verified(
    rows: &mut [InspectionDefect],
    index: usize,
    user: &ActingUser,
    kind: InspectionType,
    today: &str,
) -> bool {
    if !capabilities_for(user.role, kind).can_verify_defect {
        return false;
    }
    let Some(row) = rows.get_mut(index) else {
        return false;
    };
    if !row.completed {
        return false;
    }
    if row.verified {
        row.verified = false;
        row.verified_date.clear();
        row.verified_by.clear();
    } else {
        row.verified = true;
        row.verified_date = today.to_string();
        row.verified_by = user.name.clone();
    }
    true
}

/// Save-time projection: blank seed rows stay visible in the form but are
/// never persisted.
fn persistable_defects(rows: &[InspectionDefect]) -> Vec<InspectionDefect> {
    rows.iter()
        .filter(|row| !row.content.trim().is_empty())
        .cloned()
        .collect()
}

// --- Record identity ---

fn record_id(project_id: &str, task_number: &str, panel_id: u32, kind: InspectionType) -> String {
    format!("{project_id}_{task_number}_{panel_id}_{}", kind.as_str())
}

fn find_inspection<'a>(
    records: &'a [InspectionRecord],
    project_id: &str,
    task_number: &str,
    panel_id: u32,
    kind: InspectionType,
) -> Option<&'a InspectionRecord> {
    records.iter().find(|record| {
        record.project_id == project_id
            && record.task_number == task_number
            && record.panel_id == panel_id
            && record.kind == kind
    })
}

fn upsert_inspection(records: &mut Vec<InspectionRecord>, record: InspectionRecord) {
    let existing = records.iter().position(|r| {
        r.project_id == record.project_id
            && r.task_number == record.task_number
            && r.panel_id == record.panel_id
            && r.kind == record.kind
    });
    match existing {
        Some(index) => records[index] = record,
        None => records.push(record),
    }
}

// --- Built-in master data ---

fn builtin_master(kind: InspectionType) -> Vec<ChecklistMasterItem> {
    let rows: &[(&str, &str, &str, &str)] = match kind {
        InspectionType::Process => &PROCESS_MASTER,
        InspectionType::Final => &FINAL_MASTER,
    };
    rows.iter()
        .map(|(category, sub_category, item, criteria)| ChecklistMasterItem {
            category: (*category).to_string(),
            sub_category: (*sub_category).to_string(),
            item: (*item).to_string(),
            criteria: (*criteria).to_string(),
        })
        .collect()
}

fn seed_users() -> Vec<User> {
    let rows: [(&str, &str, UserRole, &str, &str, &str); 6] = [
        ("admin", "관리자", UserRole::Admin, "경영지원팀", "admin@qms.com", "2023-01-01"),
        ("QM-001", "김철수", UserRole::Inspector, "품질경영부", "cs.kim@company.com", "2023-03-15"),
        ("PROD-001", "이영희", UserRole::Manager, "생산부", "yh.lee@company.com", "2023-04-01"),
        ("PL-001", "이책임", UserRole::ProductionLeader, "생산부", "pl@company.com", "2023-04-05"),
        ("WORK-001", "박작업", UserRole::Worker, "생산팀", "worker@company.com", "2023-06-01"),
        ("CUST-001", "고객담당자", UserRole::Customer, "LG에너지솔루션", "cust@client.com", "2023-07-01"),
    ];
    rows.iter()
        .map(|(id, name, role, department, email, joined)| User {
            id: (*id).to_string(),
            name: (*name).to_string(),
            role: *role,
            department: (*department).to_string(),
            email: (*email).to_string(),
            status: AccountStatus::Active,
            joined_date: (*joined).to_string(),
            password: String::new(),
        })
        .collect()
}

fn dedupe_users(users: Vec<User>) -> Vec<User> {
    let mut out: Vec<User> = Vec::with_capacity(users.len());
    let mut by_id: HashMap<String, usize> = HashMap::new();
    for user in users {
        match by_id.get(user.id.as_str()) {
            Some(index) => out[*index] = user,
            None => {
                by_id.insert(user.id.clone(), out.len());
                out.push(user);
            }
        }
    }
    out
}

// --- Request/response shapes ---

#[derive(Deserialize)]
struct LoginRequest {
    id: String,
    secret: String,
}

#[derive(Deserialize)]
struct UserSaveRequest {
    user: User,
    #[serde(default)]
    edit: bool,
}

#[derive(Deserialize)]
struct UserStatusRequest {
    id: String,
    status: AccountStatus,
}

#[derive(Deserialize)]
struct ProjectSaveRequest {
    project: Project,
    #[serde(default)]
    edit: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectRenameRequest {
    old_id: String,
    new_id: String,
    new_name: String,
}

#[derive(Deserialize)]
struct TemplateGetRequest {
    #[serde(rename = "type")]
    kind: InspectionType,
}

#[derive(Deserialize)]
struct TemplateSaveRequest {
    #[serde(rename = "type")]
    kind: InspectionType,
    items: Vec<ChecklistMasterItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PanelRequest {
    project_id: String,
    task_number: String,
    panel_id: u32,
    #[serde(rename = "type")]
    kind: InspectionType,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectionSaveRequest {
    project_id: String,
    task_number: String,
    panel_id: u32,
    #[serde(rename = "type")]
    kind: InspectionType,
    check_list: Vec<ChecklistEntry>,
    #[serde(default)]
    defect_list: Vec<InspectionDefect>,
    user: ActingUser,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChecklistStatusRequest {
    entries: Vec<ChecklistEntry>,
    index: usize,
    status: ItemStatus,
    user: ActingUser,
    #[serde(rename = "type")]
    kind: InspectionType,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChecklistQcRequest {
    entries: Vec<ChecklistEntry>,
    index: usize,
    user: ActingUser,
    #[serde(rename = "type")]
    kind: InspectionType,
}

#[derive(Deserialize)]
struct DefectRowsRequest {
    rows: Vec<InspectionDefect>,
}

#[derive(Deserialize)]
struct DefectContentRequest {
    rows: Vec<InspectionDefect>,
    index: usize,
    content: String,
    user: ActingUser,
}

#[derive(Deserialize)]
struct DefectCategoryRequest {
    rows: Vec<InspectionDefect>,
    index: usize,
    category: DefectCategory,
}

#[derive(Deserialize)]
struct DefectToggleRequest {
    rows: Vec<InspectionDefect>,
    index: usize,
    user: ActingUser,
    #[serde(rename = "type")]
    kind: InspectionType,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PanelLinkRequest {
    project_id: String,
    task_number: String,
    panel_id: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectionExportRequest {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    task_number: Option<String>,
}

#[derive(Deserialize)]
struct BackupExportRequest {
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupImportRequest {
    password: String,
    action: String,
    file_data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FormSession {
    check_list: Vec<ChecklistEntry>,
    defect_list: Vec<InspectionDefect>,
    result: InspectionResult,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChecklistUpdate {
    check_list: Vec<ChecklistEntry>,
    result: InspectionResult,
    changed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DefectUpdate {
    defect_list: Vec<InspectionDefect>,
    changed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MatrixCell {
    panel_id: u32,
    process: CellColor,
    #[serde(rename = "final")]
    final_: CellColor,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MatrixProject {
    project_id: String,
    task_number: String,
    name: String,
    model_type: String,
    deadline: String,
    status: ProjectStatus,
    panel_count: u32,
    cells: Vec<MatrixCell>,
}

#[derive(Serialize)]
struct SaveFileResult {
    ok: bool,
    canceled: bool,
    filename: String,
    path: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct PickFileResult {
    ok: bool,
    canceled: bool,
    name: Option<String>,
    data: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct StorageInfoResult {
    ok: bool,
    path_label: String,
}

// --- Commands: app/window chrome ---

#[tauri::command]
fn app_version(app: AppHandle) -> String {
    app.package_info().version.to_string()
}

#[tauri::command]
fn platform_name() -> String {
    match std::env::consts::OS {
        "windows" => "win32",
        "macos" => "darwin",
        "android" => "android",
        _ => "linux",
    }
    .to_string()
}

#[tauri::command]
fn storage_info(app: AppHandle) -> Result<StorageInfoResult, String> {
    let root = storage_root_dir(&app)?;
    Ok(StorageInfoResult {
        ok: true,
        path_label: root.to_string_lossy().to_string(),
    })
}

#[tauri::command]
fn window_minimize(window: Window) -> Result<(), String> {
    window.minimize().map_err(|err| err.to_string())
}

#[tauri::command]
fn window_toggle_maximize(window: Window) -> Result<(), String> {
    if window.is_maximized().map_err(|err| err.to_string())? {
        window.unmaximize().map_err(|err| err.to_string())
    } else {
        window.maximize().map_err(|err| err.to_string())
    }
}

#[tauri::command]
fn window_is_maximized(window: Window) -> Result<bool, String> {
    window.is_maximized().map_err(|err| err.to_string())
}

#[tauri::command]
fn window_close(window: Window) -> Result<(), String> {
    window.close().map_err(|err| err.to_string())
}

// --- Commands: identity ---

#[tauri::command]
fn login(app: AppHandle, payload: LoginRequest) -> Result<Option<User>, String> {
    let id = clamp_string(payload.id.as_str(), 64, true);
    let secret = payload.secret;
    if id.is_empty() || secret.is_empty() {
        return Ok(None);
    }

    // Super-admin bootstrap: always valid, synced into the user store so the
    // account shows up in user management.
    if id == SUPER_ADMIN_ID && secret == SUPER_ADMIN_SECRET {
        let admin = User {
            id: SUPER_ADMIN_ID.to_string(),
            name: "최고관리자".to_string(),
            role: UserRole::Admin,
            department: "시스템관리".to_string(),
            email: "admin@qms.com".to_string(),
            status: AccountStatus::Active,
            joined_date: today_string(),
            password: String::new(),
        };
        let mut users = load_users(&app)?;
        match users.iter().position(|u| u.id == admin.id) {
            Some(index) => users[index] = admin.clone(),
            None => users.push(admin.clone()),
        }
        save_users(&app, &users)?;
        info!("super admin signed in");
        return Ok(Some(admin));
    }

    let users = load_users(&app)?;
    let Some(user) = users.iter().find(|u| u.id == id) else {
        return Ok(None);
    };
    if user.status != AccountStatus::Active {
        return Ok(None);
    }
    // Accounts without a stored password authenticate by name (legacy).
    let matched = if user.password.is_empty() {
        user.name == secret
    } else {
        user.password == secret
    };
    Ok(if matched { Some(user.clone()) } else { None })
}

// --- Commands: user directory ---

#[tauri::command]
fn users_list(app: AppHandle) -> Result<Vec<User>, String> {
    load_users(&app)
}

#[tauri::command]
fn user_save(app: AppHandle, payload: UserSaveRequest) -> Result<serde_json::Value, String> {
    let mut user = payload.user;
    user.id = clamp_string(user.id.as_str(), 64, true);
    user.name = clamp_string(user.name.as_str(), 80, true);
    user.department = clamp_string(user.department.as_str(), 80, true);
    user.email = clamp_string(user.email.as_str(), 120, true);
    if user.id.is_empty() || user.name.is_empty() {
        return Ok(json!({ "ok": false, "error": "ID and name are required." }));
    }

    let mut users = load_users(&app)?;
    let existing = users.iter().position(|u| u.id == user.id);
    if payload.edit {
        let Some(index) = existing else {
            return Ok(json!({ "ok": false, "error": "User not found." }));
        };
        if user.password.is_empty() {
            user.password = users[index].password.clone();
        }
        if user.joined_date.is_empty() {
            user.joined_date = users[index].joined_date.clone();
        }
        users[index] = user.clone();
    } else {
        if existing.is_some() {
            return Ok(json!({ "ok": false, "error": "A user with this ID already exists." }));
        }
        if user.joined_date.is_empty() {
            user.joined_date = today_string();
        }
        users.push(user.clone());
    }
    save_users(&app, &users)?;
    Ok(json!({ "ok": true, "user": user }))
}

#[tauri::command]
fn user_set_status(app: AppHandle, payload: UserStatusRequest) -> Result<serde_json::Value, String> {
    let id = clamp_string(payload.id.as_str(), 64, true);
    let mut users = load_users(&app)?;
    let Some(index) = users.iter().position(|u| u.id == id) else {
        return Ok(json!({ "ok": false, "error": "User not found." }));
    };
    users[index].status = payload.status;
    let user = users[index].clone();
    save_users(&app, &users)?;
    Ok(json!({ "ok": true, "user": user }))
}

// --- Commands: project directory ---

#[tauri::command]
fn projects_list(app: AppHandle) -> Result<Vec<Project>, String> {
    load_projects(&app)
}

#[tauri::command]
fn project_save(app: AppHandle, payload: ProjectSaveRequest) -> Result<serde_json::Value, String> {
    let mut project = payload.project;
    project.id = clamp_string(project.id.as_str(), 64, true);
    project.task_number = clamp_string(project.task_number.as_str(), 64, true);
    project.name = clamp_string(project.name.as_str(), 120, true);
    project.client = clamp_string(project.client.as_str(), 120, true);
    project.model_type = clamp_string(project.model_type.as_str(), 80, true);
    if project.id.is_empty() || project.task_number.is_empty() || project.name.is_empty() {
        return Ok(json!({ "ok": false, "error": "Project ID, task number, and name are required." }));
    }
    if project.panel_count == 0 {
        return Ok(json!({ "ok": false, "error": "Panel count must be at least 1." }));
    }
    if project.start_date.is_empty() {
        project.start_date = today_string();
    }

    let mut projects = load_projects(&app)?;
    let existing = projects
        .iter()
        .position(|p| p.id == project.id && p.task_number == project.task_number);
    match (payload.edit, existing) {
        (true, Some(index)) => projects[index] = project.clone(),
        (true, None) => {
            return Ok(json!({ "ok": false, "error": "Task not found." }));
        }
        (false, Some(_)) => {
            return Ok(
                json!({ "ok": false, "error": "This task number already exists for the project." }),
            );
        }
        (false, None) => projects.insert(0, project.clone()),
    }
    save_projects(&app, &projects)?;
    Ok(json!({ "ok": true, "project": project }))
}

#[tauri::command]
fn project_rename(
    app: AppHandle,
    payload: ProjectRenameRequest,
) -> Result<serde_json::Value, String> {
    let old_id = clamp_string(payload.old_id.as_str(), 64, true);
    let new_id = clamp_string(payload.new_id.as_str(), 64, true);
    let new_name = clamp_string(payload.new_name.as_str(), 120, true);
    if old_id.is_empty() || new_id.is_empty() || new_name.is_empty() {
        return Ok(json!({ "ok": false, "error": "Project ID and name are required." }));
    }
    let mut projects = load_projects(&app)?;
    let mut updated = 0_usize;
    for project in projects.iter_mut() {
        if project.id == old_id {
            project.id = new_id.clone();
            project.name = new_name.clone();
            updated += 1;
        }
    }
    if updated > 0 {
        save_projects(&app, &projects)?;
    }
    info!("renamed {updated} task(s) from project {old_id} to {new_id}");
    Ok(json!({ "ok": true, "updated": updated }))
}

// --- Commands: checklist templates ---

#[tauri::command]
fn checklist_template_get(
    app: AppHandle,
    payload: TemplateGetRequest,
) -> Result<Vec<ChecklistMasterItem>, String> {
    let templates = load_templates(&app)?;
    Ok(match payload.kind {
        InspectionType::Process => templates.process,
        InspectionType::Final => templates.final_,
    })
}

#[tauri::command]
fn checklist_template_save(
    app: AppHandle,
    payload: TemplateSaveRequest,
) -> Result<serde_json::Value, String> {
    let items: Vec<ChecklistMasterItem> = payload
        .items
        .into_iter()
        .map(|item| ChecklistMasterItem {
            category: clamp_string(item.category.as_str(), 100, true),
            sub_category: clamp_string(item.sub_category.as_str(), 100, true),
            item: clamp_string(item.item.as_str(), 500, true),
            criteria: clamp_string(item.criteria.as_str(), 500, true),
        })
        .filter(|item| !item.item.is_empty())
        .collect();
    if items.is_empty() {
        return Ok(json!({ "ok": false, "error": "Template needs at least one item." }));
    }
    let mut templates = load_templates(&app)?;
    match payload.kind {
        InspectionType::Process => templates.process = items,
        InspectionType::Final => templates.final_ = items,
    }
    save_templates(&app, &templates)?;
    let count = match payload.kind {
        InspectionType::Process => templates.process.len(),
        InspectionType::Final => templates.final_.len(),
    };
    Ok(json!({ "ok": true, "count": count }))
}

// --- Commands: inspection records ---

#[tauri::command]
fn inspections_list(app: AppHandle) -> Result<Vec<InspectionRecord>, String> {
    load_inspections(&app)
}

#[tauri::command]
fn inspection_form_load(app: AppHandle, payload: PanelRequest) -> Result<FormSession, String> {
    let templates = load_templates(&app)?;
    let master = match payload.kind {
        InspectionType::Process => &templates.process,
        InspectionType::Final => &templates.final_,
    };
    let inspections = load_inspections(&app)?;
    let existing = find_inspection(
        &inspections,
        payload.project_id.as_str(),
        payload.task_number.as_str(),
        payload.panel_id,
        payload.kind,
    );
    let check_list = merge_checklist(master, existing);
    let defect_list = seeded_defect_rows(existing.map(|r| r.defect_list.as_slice()).unwrap_or(&[]));
    let result = compute_verdict(&check_list, payload.kind);
    Ok(FormSession {
        check_list,
        defect_list,
        result,
    })
}

#[tauri::command]
fn inspection_save(
    app: AppHandle,
    payload: InspectionSaveRequest,
) -> Result<serde_json::Value, String> {
    let project_id = clamp_string(payload.project_id.as_str(), 64, true);
    let task_number = clamp_string(payload.task_number.as_str(), 64, true);
    if project_id.is_empty() || task_number.is_empty() || payload.panel_id == 0 {
        return Err("Missing panel context.".to_string());
    }
    let result = compute_verdict(&payload.check_list, payload.kind);
    let record = InspectionRecord {
        id: record_id(
            project_id.as_str(),
            task_number.as_str(),
            payload.panel_id,
            payload.kind,
        ),
        project_id,
        task_number,
        panel_id: payload.panel_id,
        kind: payload.kind,
        result,
        inspector: clamp_string(payload.user.name.as_str(), 80, true),
        date: today_string(),
        check_list: payload.check_list,
        defect_list: persistable_defects(&payload.defect_list),
    };
    let mut inspections = load_inspections(&app)?;
    upsert_inspection(&mut inspections, record.clone());
    save_inspections(&app, &inspections)?;
    info!("inspection saved: {}", record.id);
    Ok(json!({ "ok": true, "record": record }))
}

// --- Commands: checklist state machine ---

#[tauri::command]
fn checklist_set_status(payload: ChecklistStatusRequest) -> Result<ChecklistUpdate, String> {
    let mut entries = payload.entries;
    let changed = apply_status(
        &mut entries,
        payload.index,
        payload.status,
        &payload.user,
        payload.kind,
        today_string().as_str(),
    );
    let result = compute_verdict(&entries, payload.kind);
    Ok(ChecklistUpdate {
        check_list: entries,
        result,
        changed,
    })
}

#[tauri::command]
fn checklist_toggle_qc(payload: ChecklistQcRequest) -> Result<ChecklistUpdate, String> {
    let mut entries = payload.entries;
    let changed = toggle_qc(
        &mut entries,
        payload.index,
        &payload.user,
        payload.kind,
        today_string().as_str(),
    );
    let result = compute_verdict(&entries, payload.kind);
    Ok(ChecklistUpdate {
        check_list: entries,
        result,
        changed,
    })
}

// --- Commands: defect ledger ---

#[tauri::command]
fn defect_add_row(payload: DefectRowsRequest) -> Result<DefectUpdate, String> {
    let mut rows = payload.rows;
    rows.push(blank_defect_row());
    Ok(DefectUpdate {
        defect_list: rows,
        changed: true,
    })
}

#[tauri::command]
fn defect_set_content(payload: DefectContentRequest) -> Result<DefectUpdate, String> {
    let mut rows = payload.rows;
    let changed = defect_write_content(
        &mut rows,
        payload.index,
        payload.content.as_str(),
        &payload.user,
        today_string().as_str(),
    );
    Ok(DefectUpdate {
        defect_list: rows,
        changed,
    })
}

#[tauri::command]
fn defect_set_category(payload: DefectCategoryRequest) -> Result<DefectUpdate, String> {
    let mut rows = payload.rows;
    let changed = defect_write_category(&mut rows, payload.index, payload.category);
    Ok(DefectUpdate {
        defect_list: rows,
        changed,
    })
}

#[tauri::command]
fn defect_toggle_completed(payload: DefectToggleRequest) -> Result<DefectUpdate, String> {
    let mut rows = payload.rows;
    let changed = defect_flip_completed(
        &mut rows,
        payload.index,
        &payload.user,
        payload.kind,
        today_string().as_str(),
    );
    Ok(DefectUpdate {
        defect_list: rows,
        changed,
    })
}

#[tauri::command]
fn defect_toggle_verified(payload: DefectToggleRequest) -> Result<DefectUpdate, String> {
    let mut rows = payload.rows;
    let changed = defect_flip_verified(
        &mut rows,
        payload.index,
        &payload.user,
        payload.kind,
        today_string().as_str(),
    );
    Ok(DefectUpdate {
        defect_list: rows,
        changed,
    })
}

// --- Commands: matrix and dashboard ---

#[tauri::command]
fn inspection_matrix(app: AppHandle) -> Result<Vec<MatrixProject>, String> {
    let projects = load_projects(&app)?;
    let inspections = load_inspections(&app)?;
    let out = projects
        .iter()
        .map(|project| {
            let cells = (1..=project.panel_count)
                .map(|panel_id| {
                    let process = find_inspection(
                        &inspections,
                        project.id.as_str(),
                        project.task_number.as_str(),
                        panel_id,
                        InspectionType::Process,
                    );
                    let final_record = find_inspection(
                        &inspections,
                        project.id.as_str(),
                        project.task_number.as_str(),
                        panel_id,
                        InspectionType::Final,
                    );
                    MatrixCell {
                        panel_id,
                        process: color_for(process, InspectionType::Process),
                        final_: color_for(final_record, InspectionType::Final),
                    }
                })
                .collect();
            MatrixProject {
                project_id: project.id.clone(),
                task_number: project.task_number.clone(),
                name: project.name.clone(),
                model_type: project.model_type.clone(),
                deadline: project.deadline.clone(),
                status: project.status,
                panel_count: project.panel_count,
                cells,
            }
        })
        .collect();
    Ok(out)
}

#[tauri::command]
fn dashboard_stats(app: AppHandle) -> Result<serde_json::Value, String> {
    let projects = load_projects(&app)?;
    let inspections = load_inspections(&app)?;

    let mut planning = 0_usize;
    let mut production = 0_usize;
    let mut completed = 0_usize;
    let mut panels_total = 0_u64;
    for project in &projects {
        match project.status {
            ProjectStatus::Planning => planning += 1,
            ProjectStatus::Production => production += 1,
            ProjectStatus::Completed => completed += 1,
        }
        panels_total += u64::from(project.panel_count);
    }

    let mut process_pass = 0_usize;
    let mut process_pending = 0_usize;
    let mut final_pass = 0_usize;
    let mut final_pending = 0_usize;
    let mut failed = 0_usize;
    let mut defects_total = 0_usize;
    let mut defects_open = 0_usize;
    let mut defects_awaiting_verify = 0_usize;
    for record in &inspections {
        match (record.kind, effective_result(record)) {
            (_, InspectionResult::Fail) => failed += 1,
            (InspectionType::Process, InspectionResult::Pass) => process_pass += 1,
            (InspectionType::Process, InspectionResult::Pending) => process_pending += 1,
            (InspectionType::Final, InspectionResult::Pass) => final_pass += 1,
            (InspectionType::Final, InspectionResult::Pending) => final_pending += 1,
        }
        for defect in &record.defect_list {
            defects_total += 1;
            if !defect.completed {
                defects_open += 1;
            } else if !defect.verified {
                defects_awaiting_verify += 1;
            }
        }
    }

    Ok(json!({
        "projects": {
            "planning": planning,
            "production": production,
            "completed": completed,
            "panels": panels_total,
        },
        "inspections": {
            "processPass": process_pass,
            "processPending": process_pending,
            "finalPass": final_pass,
            "finalPending": final_pending,
            "failed": failed,
        },
        "defects": {
            "total": defects_total,
            "open": defects_open,
            "awaitingVerify": defects_awaiting_verify,
        },
    }))
}

// --- Commands: links, reports, exports ---

#[tauri::command]
fn copy_panel_link(app: AppHandle, payload: PanelLinkRequest) -> Result<String, String> {
    let link = format!(
        "{PANEL_LINK_SCHEME}?project={}&task={}&panel={}",
        payload.project_id, payload.task_number, payload.panel_id
    );
    app.clipboard()
        .write_text(link.clone())
        .map_err(|err| err.to_string())?;
    Ok(link)
}

#[tauri::command]
fn inspection_report_open(
    app: AppHandle,
    payload: PanelRequest,
) -> Result<serde_json::Value, String> {
    let inspections = load_inspections(&app)?;
    let Some(record) = find_inspection(
        &inspections,
        payload.project_id.as_str(),
        payload.task_number.as_str(),
        payload.panel_id,
        payload.kind,
    ) else {
        return Ok(json!({ "ok": false, "error": "No saved inspection for this panel." }));
    };
    let projects = load_projects(&app)?;
    let project = projects
        .iter()
        .find(|p| p.id == payload.project_id && p.task_number == payload.task_number);
    let content = build_inspection_report(project, record);

    let root = storage_root_dir(&app)?;
    let filename = sanitize_filename(
        format!(
            "{}_{}_panel{}_{}.md",
            record.project_id,
            record.task_number,
            record.panel_id,
            record.kind.as_str()
        )
        .as_str(),
    );
    let path = root.join(REPORTS_DIR).join(filename);
    write_text_file(path.clone(), content.as_str())?;
    app.opener()
        .open_url(path.to_string_lossy().to_string(), Option::<String>::None)
        .map_err(|err| err.to_string())?;
    Ok(json!({ "ok": true, "path": path.to_string_lossy() }))
}

#[tauri::command]
fn inspection_export_csv(
    app: AppHandle,
    payload: InspectionExportRequest,
) -> Result<SaveFileResult, String> {
    let inspections = load_inspections(&app)?;
    let rows: Vec<Vec<String>> = inspections
        .iter()
        .filter(|record| {
            payload
                .project_id
                .as_deref()
                .map_or(true, |id| record.project_id == id)
        })
        .filter(|record| {
            payload
                .task_number
                .as_deref()
                .map_or(true, |task| record.task_number == task)
        })
        .map(|record| {
            let mut ok = 0_usize;
            let mut ng = 0_usize;
            let mut na = 0_usize;
            let mut pending = 0_usize;
            let mut qc_signed = 0_usize;
            for entry in &record.check_list {
                match entry.status {
                    ItemStatus::Ok => ok += 1,
                    ItemStatus::Ng => ng += 1,
                    ItemStatus::NotApplicable => na += 1,
                    ItemStatus::Pending => pending += 1,
                }
                if !entry.qc_inspector.is_empty() {
                    qc_signed += 1;
                }
            }
            vec![
                record.project_id.clone(),
                record.task_number.clone(),
                record.panel_id.to_string(),
                record.kind.as_str().to_string(),
                effective_result(record).as_str().to_string(),
                record.inspector.clone(),
                record.date.clone(),
                ok.to_string(),
                ng.to_string(),
                na.to_string(),
                pending.to_string(),
                qc_signed.to_string(),
                record.defect_list.len().to_string(),
            ]
        })
        .collect();
    let csv = rows_to_csv(&EXPORT_COLUMNS, rows.as_slice());
    let default_name = format!("inspection_history_{}.csv", today_string());
    save_file_dialog(default_name.as_str(), csv.as_str(), &[("CSV", &["csv"])])
}

// --- Commands: encrypted backup ---

#[tauri::command]
fn backup_export(app: AppHandle, payload: BackupExportRequest) -> Result<SaveFileResult, String> {
    if payload.password.trim().is_empty() {
        return Err("Password is required.".to_string());
    }
    let bundle = collect_backup(&app)?;
    let plaintext = serde_json::to_string(&bundle).map_err(|err| err.to_string())?;
    let envelope = encrypt_text(plaintext.as_str(), payload.password.as_str())?;
    let content = serde_json::to_string_pretty(&envelope).map_err(|err| err.to_string())?;
    let default_name = format!("qms-backup-{}.enc", today_string());
    save_file_dialog(
        default_name.as_str(),
        content.as_str(),
        &[("QMS Backup", &["enc"])],
    )
}

#[tauri::command]
fn pick_backup_file() -> Result<PickFileResult, String> {
    let path = rfd::FileDialog::new()
        .add_filter("QMS Backup", &["enc", "json"])
        .pick_file();

    let Some(path) = path else {
        return Ok(PickFileResult {
            ok: false,
            canceled: true,
            name: None,
            data: None,
            error: None,
        });
    };

    let data = fs::read_to_string(&path).map_err(|err| err.to_string())?;
    let name = path
        .file_name()
        .map(|value| value.to_string_lossy().to_string());

    Ok(PickFileResult {
        ok: true,
        canceled: false,
        name,
        data: Some(data),
        error: None,
    })
}

#[tauri::command]
fn backup_import(
    app: AppHandle,
    payload: BackupImportRequest,
) -> Result<serde_json::Value, String> {
    let action = clamp_string(payload.action.as_str(), 20, true).to_lowercase();
    if action != "replace" && action != "merge" {
        return Ok(json!({ "ok": false, "code": "broken", "error": "Invalid import action." }));
    }
    let envelope: CryptoEnvelope = match serde_json::from_str(payload.file_data.as_str()) {
        Ok(value) => value,
        Err(_) => {
            return Ok(
                json!({ "ok": false, "code": "broken", "error": "Import file is not valid JSON." }),
            );
        }
    };
    let decrypted = match decrypt_envelope(&envelope, payload.password.as_str())? {
        Some(value) => value,
        None => {
            return Ok(
                json!({ "ok": false, "code": "password", "error": "Unable to decrypt the import file." }),
            );
        }
    };
    let incoming: BackupBundle = match serde_json::from_str(decrypted.as_str()) {
        Ok(value) => value,
        Err(_) => {
            return Ok(
                json!({ "ok": false, "code": "broken", "error": "Import file does not contain QMS data." }),
            );
        }
    };

    let current = collect_backup(&app)?;
    let next = apply_backup(action.as_str(), incoming, current);
    persist_backup(&app, &next)?;
    info!(
        "backup import ({action}): {} users, {} projects, {} inspections",
        next.users.len(),
        next.projects.len(),
        next.inspections.len()
    );
    Ok(json!({
        "ok": true,
        "action": action,
        "users": next.users.len(),
        "projects": next.projects.len(),
        "inspections": next.inspections.len(),
    }))
}

fn collect_backup(app: &AppHandle) -> Result<BackupBundle, String> {
    Ok(BackupBundle {
        version: BACKUP_VERSION,
        users: load_users(app)?,
        projects: load_projects(app)?,
        inspections: load_inspections(app)?,
        templates: load_templates(app)?,
    })
}

fn apply_backup(action: &str, incoming: BackupBundle, current: BackupBundle) -> BackupBundle {
    if action == "replace" {
        let mut out = incoming;
        out.version = BACKUP_VERSION;
        out.users = dedupe_users(out.users);
        return out;
    }

    let mut out = current;
    for user in incoming.users {
        match out.users.iter().position(|u| u.id == user.id) {
            Some(index) => out.users[index] = user,
            None => out.users.push(user),
        }
    }
    for project in incoming.projects {
        match out
            .projects
            .iter()
            .position(|p| p.id == project.id && p.task_number == project.task_number)
        {
            Some(index) => out.projects[index] = project,
            None => out.projects.push(project),
        }
    }
    for record in incoming.inspections {
        upsert_inspection(&mut out.inspections, record);
    }
    if !incoming.templates.process.is_empty() {
        out.templates.process = incoming.templates.process;
    }
    if !incoming.templates.final_.is_empty() {
        out.templates.final_ = incoming.templates.final_;
    }
    out.version = BACKUP_VERSION;
    out
}

fn persist_backup(app: &AppHandle, bundle: &BackupBundle) -> Result<(), String> {
    save_users(app, &bundle.users)?;
    save_projects(app, &bundle.projects)?;
    save_inspections(app, &bundle.inspections)?;
    save_templates(app, &bundle.templates)?;
    Ok(())
}

// --- Report rendering ---

fn build_inspection_report(project: Option<&Project>, record: &InspectionRecord) -> String {
    let mut lines: Vec<String> = Vec::new();
    let title = match record.kind {
        InspectionType::Process => "배전반 공정 검사 성적서",
        InspectionType::Final => "배전반 최종 검사 성적서",
    };
    lines.push(format!("# {title}"));
    lines.push(String::new());
    if let Some(project) = project {
        lines.push(format!("프로젝트명: {}", project.name));
        if !project.model_type.is_empty() {
            lines.push(format!("기종: {}", project.model_type));
        }
        if !project.deadline.is_empty() {
            lines.push(format!("납기: {}", project.deadline));
        }
    }
    lines.push(format!("제번: {}", record.project_id));
    lines.push(format!("Task No: {}", record.task_number));
    lines.push(format!("판넬 번호: #{}", record.panel_id));
    lines.push(format!("작성자: {}", record.inspector));
    lines.push(format!("작성일: {}", record.date));
    lines.push(String::new());

    let mut current_category = String::new();
    for entry in &record.check_list {
        if entry.category != current_category {
            current_category = entry.category.clone();
            lines.push(format!("## {}", current_category.replace('\n', " ")));
        }
        let mut line = format!(
            "- [{}] {}",
            entry.status.as_str(),
            entry.item.replace('\n', " ")
        );
        if !entry.inspector.is_empty() {
            line.push_str(
                format!(" | 작업자: {} ({})", entry.inspector, entry.inspection_date).as_str(),
            );
        }
        if !entry.qc_inspector.is_empty() {
            line.push_str(format!(" | QC: {} ({})", entry.qc_inspector, entry.qc_date).as_str());
        }
        lines.push(line);
    }

    if !record.defect_list.is_empty() {
        lines.push(String::new());
        lines.push("## 불량 조치 사항".to_string());
        for defect in &record.defect_list {
            let category = match defect.category {
                DefectCategory::Enclosure => "외함",
                DefectCategory::System => "시스템",
            };
            let mut line = format!(
                "- [{}] {} ({} {})",
                category, defect.content, defect.writer, defect.date
            );
            if defect.completed {
                line.push_str(
                    format!(" | 조치: {} ({})", defect.action_by, defect.action_date).as_str(),
                );
            }
            if defect.verified {
                line.push_str(
                    format!(" | 확인: {} ({})", defect.verified_by, defect.verified_date).as_str(),
                );
            }
            lines.push(line);
        }
    }

    lines.push(String::new());
    let verdict = match effective_result(record) {
        InspectionResult::Pass => "완료 (Completed)",
        InspectionResult::Fail => "불합격 (Fail)",
        InspectionResult::Pending => "진행중 (In Progress)",
    };
    lines.push(format!("종합 판정: {verdict}"));
    lines.join("\n")
}

// --- Storage ---

fn storage_root_dir(app: &AppHandle) -> Result<PathBuf, String> {
    static RESOLVED_ROOT: OnceLock<PathBuf> = OnceLock::new();
    if let Some(root) = RESOLVED_ROOT.get() {
        return Ok(root.clone());
    }
    let base = app.path().app_data_dir().map_err(|err| err.to_string())?;
    let root = base.join("QMS");
    fs::create_dir_all(root.as_path()).map_err(|err| err.to_string())?;
    let _ = RESOLVED_ROOT.set(root.clone());
    Ok(root)
}

fn store_path(app: &AppHandle, name: &str) -> Result<PathBuf, String> {
    Ok(storage_root_dir(app)?.join(name))
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|err| err.to_string())?;
    match serde_json::from_str::<T>(raw.as_str()) {
        Ok(value) => Ok(Some(value)),
        Err(_) => Ok(None),
    }
}

fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let content = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    write_text_file(path.to_path_buf(), content.as_str())
}

fn load_users(app: &AppHandle) -> Result<Vec<User>, String> {
    let path = store_path(app, USERS_FILE)?;
    match read_json_file::<Vec<User>>(path.as_path())? {
        Some(users) if !users.is_empty() => Ok(dedupe_users(users)),
        _ => {
            let seeds = seed_users();
            if let Err(err) = write_json_file(path.as_path(), &seeds) {
                warn!("unable to seed user store: {err}");
            } else {
                info!("user store empty; seeded {} default accounts", seeds.len());
            }
            Ok(seeds)
        }
    }
}

fn save_users(app: &AppHandle, users: &[User]) -> Result<(), String> {
    let path = store_path(app, USERS_FILE)?;
    write_json_file(path.as_path(), &users.to_vec())
}

fn load_projects(app: &AppHandle) -> Result<Vec<Project>, String> {
    let path = store_path(app, PROJECTS_FILE)?;
    Ok(read_json_file::<Vec<Project>>(path.as_path())?.unwrap_or_default())
}

fn save_projects(app: &AppHandle, projects: &[Project]) -> Result<(), String> {
    let path = store_path(app, PROJECTS_FILE)?;
    write_json_file(path.as_path(), &projects.to_vec())
}

fn load_inspections(app: &AppHandle) -> Result<Vec<InspectionRecord>, String> {
    let path = store_path(app, INSPECTIONS_FILE)?;
    Ok(read_json_file::<Vec<InspectionRecord>>(path.as_path())?.unwrap_or_default())
}

fn save_inspections(app: &AppHandle, inspections: &[InspectionRecord]) -> Result<(), String> {
    let path = store_path(app, INSPECTIONS_FILE)?;
    write_json_file(path.as_path(), &inspections.to_vec())
}

/// Loads the template store, seeding any missing inspection type from the
/// built-in masters. An unreadable store falls back to the defaults as well;
/// logged, never fatal.
fn load_templates(app: &AppHandle) -> Result<TemplateStore, String> {
    let path = store_path(app, TEMPLATES_FILE)?;
    let mut templates = match read_json_file::<TemplateStore>(path.as_path())? {
        Some(value) => value,
        None => {
            if path.exists() {
                warn!("checklist template store unreadable; using built-in masters");
            }
            TemplateStore::default()
        }
    };
    let mut changed = false;
    if templates.process.is_empty() {
        templates.process = builtin_master(InspectionType::Process);
        changed = true;
    }
    if templates.final_.is_empty() {
        templates.final_ = builtin_master(InspectionType::Final);
        changed = true;
    }
    if changed {
        if let Err(err) = write_json_file(path.as_path(), &templates) {
            warn!("unable to persist seeded checklist templates: {err}");
        }
    }
    Ok(templates)
}

fn save_templates(app: &AppHandle, templates: &TemplateStore) -> Result<(), String> {
    let path = store_path(app, TEMPLATES_FILE)?;
    write_json_file(path.as_path(), templates)
}

fn write_text_file(path: PathBuf, content: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| err.to_string())?;
    }
    fs::write(path, content).map_err(|err| err.to_string())?;
    Ok(())
}

fn save_file_dialog(
    default_name: &str,
    content: &str,
    filters: &[(&str, &[&str])],
) -> Result<SaveFileResult, String> {
    let default_name = sanitize_filename(default_name);
    let mut dialog = rfd::FileDialog::new().set_file_name(default_name.as_str());
    for (label, extensions) in filters {
        dialog = dialog.add_filter(*label, extensions);
    }
    let path = dialog.save_file();

    let Some(path) = path else {
        return Ok(SaveFileResult {
            ok: false,
            canceled: true,
            filename: default_name,
            path: None,
            error: None,
        });
    };

    write_text_file(path.clone(), content)?;
    Ok(SaveFileResult {
        ok: true,
        canceled: false,
        filename: default_name,
        path: Some(path.to_string_lossy().to_string()),
        error: None,
    })
}

// --- Small helpers ---

fn now_string() -> String {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    ms.to_string()
}

fn today_string() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

fn new_id() -> String {
    let mut bytes = [0_u8; 10];
    OsRng.fill_bytes(&mut bytes);
    let mut hex = String::new();
    for b in bytes {
        hex.push_str(format!("{:02x}", b).as_str());
    }
    format!("id-{}-{hex}", now_string())
}

fn clamp_string(value: &str, max_len: usize, trim: bool) -> String {
    let mut out = if trim {
        value.trim().to_string()
    } else {
        value.to_string()
    };
    out = out
        .chars()
        .filter(|ch| {
            let code = *ch as u32;
            code >= 32 && code != 127 || *ch == '\n'
        })
        .collect();
    if out.chars().count() > max_len {
        out = out.chars().take(max_len).collect();
    }
    out
}

fn sanitize_filename(value: &str) -> String {
    let mut out = String::new();
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "qms-export".to_string()
    } else {
        trimmed.to_string()
    }
}

fn should_neutralize_csv(value: &str) -> bool {
    let trimmed = value.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('\'') {
        return false;
    }
    matches!(
        trimmed.chars().next(),
        Some('=') | Some('+') | Some('-') | Some('@')
    )
}

fn neutralize_csv_formula(value: &str) -> String {
    if should_neutralize_csv(value) {
        format!("'{value}")
    } else {
        value.to_string()
    }
}

fn csv_escape(value: &str) -> String {
    let safe = neutralize_csv_formula(value);
    if safe.contains(',') || safe.contains('"') || safe.contains('\n') || safe.contains('\r') {
        format!("\"{}\"", safe.replace('"', "\"\""))
    } else {
        safe
    }
}

fn rows_to_csv(columns: &[&str], rows: &[Vec<String>]) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(
        columns
            .iter()
            .map(|col| csv_escape(col))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in rows {
        let line = row
            .iter()
            .map(|value| csv_escape(value.as_str()))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }
    lines.join("\n")
}

// --- Crypto (backup envelope) ---

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

fn decode_b64(value: &str) -> Result<Vec<u8>, String> {
    B64.decode(value).map_err(|err| err.to_string())
}

fn encode_b64(bytes: &[u8]) -> String {
    B64.encode(bytes)
}

fn encrypt_text(text: &str, password: &str) -> Result<CryptoEnvelope, String> {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    let key = derive_key(password, &salt, DEFAULT_PBKDF2_ITERATIONS);

    let mut iv = [0u8; 12];
    OsRng.fill_bytes(&mut iv);
    let cipher = Aes256Gcm::new_from_slice(key.as_slice()).map_err(|err| err.to_string())?;
    let nonce = Nonce::from_slice(&iv);
    let encrypted = cipher
        .encrypt(nonce, text.as_bytes())
        .map_err(|err| err.to_string())?;

    if encrypted.len() < 16 {
        return Err("Encryption output too short.".to_string());
    }
    let split_at = encrypted.len() - 16;
    let (data, tag) = encrypted.split_at(split_at);

    Ok(CryptoEnvelope {
        v: 1,
        salt: encode_b64(&salt),
        iv: encode_b64(&iv),
        tag: encode_b64(tag),
        data: encode_b64(data),
    })
}

fn decrypt_envelope(payload: &CryptoEnvelope, password: &str) -> Result<Option<String>, String> {
    let salt = match decode_b64(payload.salt.as_str()) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    let iv = match decode_b64(payload.iv.as_str()) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    let tag = match decode_b64(payload.tag.as_str()) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    let data = match decode_b64(payload.data.as_str()) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    if salt.is_empty() || iv.len() != 12 || tag.is_empty() || data.is_empty() {
        return Ok(None);
    }

    let key = derive_key(password, salt.as_slice(), DEFAULT_PBKDF2_ITERATIONS);
    let cipher = Aes256Gcm::new_from_slice(key.as_slice()).map_err(|err| err.to_string())?;
    let nonce = Nonce::from_slice(iv.as_slice());
    let mut combined = Vec::with_capacity(data.len() + tag.len());
    combined.extend_from_slice(data.as_slice());
    combined.extend_from_slice(tag.as_slice());

    let decrypted = match cipher.decrypt(nonce, combined.as_slice()) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };

    match String::from_utf8(decrypted) {
        Ok(text) => Ok(Some(text)),
        Err(_) => Ok(None),
    }
}

fn main() {
    tauri::Builder::default()
        .plugin(tauri_plugin_log::Builder::default().build())
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_clipboard_manager::init())
        .invoke_handler(tauri::generate_handler![
            app_version,
            platform_name,
            storage_info,
            window_minimize,
            window_toggle_maximize,
            window_is_maximized,
            window_close,
            login,
            users_list,
            user_save,
            user_set_status,
            projects_list,
            project_save,
            project_rename,
            checklist_template_get,
            checklist_template_save,
            inspections_list,
            inspection_form_load,
            inspection_save,
            checklist_set_status,
            checklist_toggle_qc,
            defect_add_row,
            defect_set_content,
            defect_set_category,
            defect_toggle_completed,
            defect_toggle_verified,
            inspection_matrix,
            dashboard_stats,
            copy_panel_link,
            inspection_report_open,
            inspection_export_csv,
            backup_export,
            pick_backup_file,
            backup_import
        ])
        .run(tauri::generate_context!())
        .expect("failed to run QMS Inspection Tracker");
}

#[cfg(test)]
mod tests {
    use super::*;

    const TODAY: &str = "2024-07-01";

    fn master(item: &str) -> ChecklistMasterItem {
        ChecklistMasterItem {
            category: "일반".to_string(),
            sub_category: "-".to_string(),
            item: item.to_string(),
            criteria: "criteria".to_string(),
        }
    }

    fn entry(item: &str, status: ItemStatus) -> ChecklistEntry {
        let mut out = blank_entry(&master(item));
        out.status = status;
        out
    }

    fn signed_entry(item: &str, status: ItemStatus, qc: &str) -> ChecklistEntry {
        let mut out = entry(item, status);
        out.qc_inspector = qc.to_string();
        if !qc.is_empty() {
            out.qc_date = TODAY.to_string();
        }
        out
    }

    fn actor(role: UserRole) -> ActingUser {
        ActingUser {
            name: "김철수".to_string(),
            role,
        }
    }

    fn record_with(
        kind: InspectionType,
        result: InspectionResult,
        entries: Vec<ChecklistEntry>,
    ) -> InspectionRecord {
        InspectionRecord {
            id: record_id("P24-001", "T-101", 1, kind),
            project_id: "P24-001".to_string(),
            task_number: "T-101".to_string(),
            panel_id: 1,
            kind,
            result,
            inspector: "이영희".to_string(),
            date: TODAY.to_string(),
            check_list: entries,
            defect_list: Vec::new(),
        }
    }

    fn filled_defect(content: &str) -> InspectionDefect {
        let mut row = blank_defect_row();
        row.content = content.to_string();
        row.date = TODAY.to_string();
        row.writer = "박작업".to_string();
        row
    }

    // Merge engine

    #[test]
    fn merge_without_record_produces_blank_pending_entries() {
        let masters = vec![master("A"), master("B")];
        let merged = merge_checklist(&masters, None);
        assert_eq!(merged.len(), 2);
        for entry in &merged {
            assert_eq!(entry.status, ItemStatus::Pending);
            assert!(entry.inspector.is_empty());
            assert!(entry.qc_inspector.is_empty());
        }
    }

    #[test]
    fn merge_preserves_saved_answers_in_template_order() {
        let masters = vec![master("A"), master("B"), master("C")];
        let mut saved = entry("B", ItemStatus::Ok);
        saved.inspector = "박작업".to_string();
        saved.inspection_date = TODAY.to_string();
        let record = record_with(InspectionType::Process, InspectionResult::Pending, vec![saved]);

        let merged = merge_checklist(&masters, Some(&record));
        let items: Vec<&str> = merged.iter().map(|e| e.item.as_str()).collect();
        assert_eq!(items, vec!["A", "B", "C"]);
        assert_eq!(merged[0].status, ItemStatus::Pending);
        assert_eq!(merged[1].status, ItemStatus::Ok);
        assert_eq!(merged[1].inspector, "박작업");
        assert_eq!(merged[2].status, ItemStatus::Pending);
    }

    #[test]
    fn merge_relabels_from_master_without_touching_saved_status() {
        let mut updated = master("A");
        updated.criteria = "revised criteria".to_string();
        updated.category = "외관".to_string();
        let mut saved = entry("A", ItemStatus::Ng);
        saved.criteria = "old criteria".to_string();
        let record = record_with(InspectionType::Final, InspectionResult::Pending, vec![saved]);

        let merged = merge_checklist(&[updated], Some(&record));
        assert_eq!(merged[0].criteria, "revised criteria");
        assert_eq!(merged[0].category, "외관");
        assert_eq!(merged[0].status, ItemStatus::Ng);
    }

    #[test]
    fn merge_drops_items_removed_from_template() {
        let masters = vec![master("A")];
        let record = record_with(
            InspectionType::Process,
            InspectionResult::Pending,
            vec![entry("A", ItemStatus::Ok), entry("deleted", ItemStatus::Ok)],
        );
        let merged = merge_checklist(&masters, Some(&record));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].item, "A");
    }

    // Verdict calculator

    #[test]
    fn verdict_is_pending_for_empty_checklist() {
        assert_eq!(
            compute_verdict(&[], InspectionType::Process),
            InspectionResult::Pending
        );
        assert_eq!(
            compute_verdict(&[], InspectionType::Final),
            InspectionResult::Pending
        );
    }

    #[test]
    fn all_na_checklist_never_passes() {
        let entries = vec![
            signed_entry("A", ItemStatus::NotApplicable, "이책임"),
            signed_entry("B", ItemStatus::NotApplicable, "이책임"),
        ];
        assert_eq!(
            compute_verdict(&entries, InspectionType::Process),
            InspectionResult::Pending
        );
        assert_eq!(
            compute_verdict(&entries, InspectionType::Final),
            InspectionResult::Pending
        );
    }

    #[test]
    fn process_verdict_tracks_qc_coverage() {
        let mut entries = vec![
            signed_entry("A", ItemStatus::Ok, "이책임"),
            signed_entry("B", ItemStatus::Ok, "이책임"),
            signed_entry("C", ItemStatus::Ok, ""),
        ];
        assert_eq!(
            compute_verdict(&entries, InspectionType::Process),
            InspectionResult::Pending
        );

        assert!(toggle_qc(
            &mut entries,
            2,
            &actor(UserRole::Inspector),
            InspectionType::Process,
            TODAY
        ));
        assert_eq!(
            compute_verdict(&entries, InspectionType::Process),
            InspectionResult::Pass
        );
    }

    #[test]
    fn process_verdict_ignores_ng_status() {
        let entries = vec![
            signed_entry("A", ItemStatus::Ng, "이책임"),
            signed_entry("B", ItemStatus::Ok, "이책임"),
        ];
        assert_eq!(
            compute_verdict(&entries, InspectionType::Process),
            InspectionResult::Pass
        );
    }

    #[test]
    fn final_verdict_requires_every_item_ok() {
        let mut entries = vec![
            entry("A", ItemStatus::Ok),
            entry("B", ItemStatus::Ng),
            entry("C", ItemStatus::Ok),
        ];
        assert_eq!(
            compute_verdict(&entries, InspectionType::Final),
            InspectionResult::Pending
        );

        assert!(apply_status(
            &mut entries,
            1,
            ItemStatus::Ok,
            &actor(UserRole::Inspector),
            InspectionType::Final,
            TODAY
        ));
        assert_eq!(
            compute_verdict(&entries, InspectionType::Final),
            InspectionResult::Pass
        );
    }

    #[test]
    fn final_verdict_ignores_qc_fields() {
        let entries = vec![
            signed_entry("A", ItemStatus::Ok, ""),
            signed_entry("B", ItemStatus::Ok, ""),
        ];
        assert_eq!(
            compute_verdict(&entries, InspectionType::Final),
            InspectionResult::Pass
        );
    }

    #[test]
    fn verdict_is_idempotent() {
        let entries = vec![
            signed_entry("A", ItemStatus::Ok, "이책임"),
            signed_entry("B", ItemStatus::NotApplicable, ""),
            signed_entry("C", ItemStatus::Ng, ""),
        ];
        for kind in [InspectionType::Process, InspectionType::Final] {
            let first = compute_verdict(&entries, kind);
            let second = compute_verdict(&entries, kind);
            assert_eq!(first, second);
        }
    }

    // Status-entry state machine

    #[test]
    fn setting_same_status_twice_reverts_to_pending() {
        let mut entries = vec![entry("A", ItemStatus::Pending)];
        let worker = actor(UserRole::Worker);

        assert!(apply_status(
            &mut entries,
            0,
            ItemStatus::Ok,
            &worker,
            InspectionType::Process,
            TODAY
        ));
        assert_eq!(entries[0].status, ItemStatus::Ok);
        assert_eq!(entries[0].inspector, "김철수");
        assert_eq!(entries[0].inspection_date, TODAY);

        assert!(apply_status(
            &mut entries,
            0,
            ItemStatus::Ok,
            &worker,
            InspectionType::Process,
            TODAY
        ));
        assert_eq!(entries[0].status, ItemStatus::Pending);
        assert!(entries[0].inspector.is_empty());
        assert!(entries[0].inspection_date.is_empty());
        assert!(entries[0].qc_inspector.is_empty());
    }

    #[test]
    fn any_status_change_clears_qc_sign_off() {
        let worker = actor(UserRole::Worker);

        let mut entries = vec![signed_entry("A", ItemStatus::Ok, "이책임")];
        assert!(apply_status(
            &mut entries,
            0,
            ItemStatus::Ng,
            &worker,
            InspectionType::Process,
            TODAY
        ));
        assert!(entries[0].qc_inspector.is_empty());
        assert!(entries[0].qc_date.is_empty());

        // Reverting to pending clears it too.
        let mut entries = vec![signed_entry("A", ItemStatus::Ok, "이책임")];
        assert!(apply_status(
            &mut entries,
            0,
            ItemStatus::Ok,
            &worker,
            InspectionType::Process,
            TODAY
        ));
        assert_eq!(entries[0].status, ItemStatus::Pending);
        assert!(entries[0].qc_inspector.is_empty());
    }

    #[test]
    fn status_edit_without_capability_is_a_silent_noop() {
        let mut entries = vec![entry("A", ItemStatus::Pending)];
        let before = entries.clone();

        // Inspectors do not enter process statuses; workers do not enter final.
        assert!(!apply_status(
            &mut entries,
            0,
            ItemStatus::Ok,
            &actor(UserRole::Inspector),
            InspectionType::Process,
            TODAY
        ));
        assert!(!apply_status(
            &mut entries,
            0,
            ItemStatus::Ok,
            &actor(UserRole::Worker),
            InspectionType::Final,
            TODAY
        ));
        assert!(!apply_status(
            &mut entries,
            0,
            ItemStatus::Ok,
            &actor(UserRole::Customer),
            InspectionType::Final,
            TODAY
        ));
        assert_eq!(entries, before);
    }

    #[test]
    fn requesting_pending_directly_is_a_noop() {
        let mut entries = vec![entry("A", ItemStatus::Ok)];
        assert!(!apply_status(
            &mut entries,
            0,
            ItemStatus::Pending,
            &actor(UserRole::Worker),
            InspectionType::Process,
            TODAY
        ));
        assert_eq!(entries[0].status, ItemStatus::Ok);
    }

    #[test]
    fn qc_toggle_sets_then_clears_stamp() {
        let mut entries = vec![entry("A", ItemStatus::Ok)];
        let reviewer = actor(UserRole::ProductionLeader);

        assert!(toggle_qc(
            &mut entries,
            0,
            &reviewer,
            InspectionType::Process,
            TODAY
        ));
        assert_eq!(entries[0].qc_inspector, "김철수");
        assert_eq!(entries[0].qc_date, TODAY);

        assert!(toggle_qc(
            &mut entries,
            0,
            &reviewer,
            InspectionType::Process,
            TODAY
        ));
        assert!(entries[0].qc_inspector.is_empty());
        assert!(entries[0].qc_date.is_empty());
    }

    #[test]
    fn qc_sign_off_blocked_on_pending_entries_and_for_workers() {
        let mut entries = vec![entry("A", ItemStatus::Pending), entry("B", ItemStatus::Ok)];
        assert!(!toggle_qc(
            &mut entries,
            0,
            &actor(UserRole::Inspector),
            InspectionType::Process,
            TODAY
        ));
        assert!(!toggle_qc(
            &mut entries,
            1,
            &actor(UserRole::Worker),
            InspectionType::Process,
            TODAY
        ));
        assert!(entries[0].qc_inspector.is_empty());
        assert!(entries[1].qc_inspector.is_empty());
    }

    #[test]
    fn capabilities_matrix_matches_role_rules() {
        let worker = capabilities_for(UserRole::Worker, InspectionType::Process);
        assert!(worker.can_edit_checklist);
        assert!(!worker.can_sign_qc);
        assert!(worker.can_complete_defect);
        assert!(!worker.can_verify_defect);

        let worker_final = capabilities_for(UserRole::Worker, InspectionType::Final);
        assert!(!worker_final.can_edit_checklist);

        let inspector = capabilities_for(UserRole::Inspector, InspectionType::Process);
        assert!(!inspector.can_edit_checklist);
        assert!(inspector.can_sign_qc);
        assert!(inspector.can_verify_defect);

        let inspector_final = capabilities_for(UserRole::Inspector, InspectionType::Final);
        assert!(inspector_final.can_edit_checklist);
        assert!(!inspector_final.can_sign_qc);

        let customer = capabilities_for(UserRole::Customer, InspectionType::Final);
        assert!(!customer.can_edit_checklist);
        assert!(!customer.can_sign_qc);
        assert!(!customer.can_complete_defect);
        assert!(!customer.can_verify_defect);
    }

    // Defect ledger

    #[test]
    fn completing_a_blank_defect_row_is_a_noop() {
        let mut rows = seeded_defect_rows(&[]);
        assert!(!defect_flip_completed(
            &mut rows,
            0,
            &actor(UserRole::Worker),
            InspectionType::Process,
            TODAY
        ));
        assert!(!rows[0].completed);
        assert!(rows[0].action_by.is_empty());
    }

    #[test]
    fn verifying_an_uncompleted_defect_is_a_noop() {
        let mut rows = vec![filled_defect("도장 불량")];
        assert!(!defect_flip_verified(
            &mut rows,
            0,
            &actor(UserRole::ProductionLeader),
            InspectionType::Process,
            TODAY
        ));
        assert!(!rows[0].verified);
    }

    #[test]
    fn defect_two_stage_workflow_stamps_and_clears() {
        let mut rows = vec![filled_defect("도장 불량")];
        let worker = actor(UserRole::Worker);
        let leader = actor(UserRole::ProductionLeader);

        assert!(defect_flip_completed(
            &mut rows,
            0,
            &worker,
            InspectionType::Process,
            TODAY
        ));
        assert!(rows[0].completed);
        assert_eq!(rows[0].action_by, "김철수");
        assert_eq!(rows[0].action_date, TODAY);

        assert!(defect_flip_verified(
            &mut rows,
            0,
            &leader,
            InspectionType::Process,
            TODAY
        ));
        assert!(rows[0].verified);
        assert_eq!(rows[0].verified_by, "김철수");

        // Unchecking completion withdraws the verification too.
        assert!(defect_flip_completed(
            &mut rows,
            0,
            &worker,
            InspectionType::Process,
            TODAY
        ));
        assert!(!rows[0].completed);
        assert!(!rows[0].verified);
        assert!(rows[0].action_date.is_empty());
        assert!(rows[0].verified_date.is_empty());
    }

    #[test]
    fn defect_role_gates_are_silent_noops() {
        let mut rows = vec![filled_defect("치수 오차")];
        assert!(!defect_flip_completed(
            &mut rows,
            0,
            &actor(UserRole::Customer),
            InspectionType::Process,
            TODAY
        ));
        rows[0].completed = true;
        assert!(!defect_flip_verified(
            &mut rows,
            0,
            &actor(UserRole::Worker),
            InspectionType::Process,
            TODAY
        ));
        assert!(!rows[0].verified);
    }

    #[test]
    fn writing_content_stamps_writer_once() {
        let mut rows = seeded_defect_rows(&[]);
        let worker = actor(UserRole::Worker);

        assert!(defect_write_content(&mut rows, 0, "외함 스크래치", &worker, TODAY));
        assert_eq!(rows[0].writer, "김철수");
        assert_eq!(rows[0].date, TODAY);

        // Editing non-empty content keeps the original stamp.
        let other = ActingUser {
            name: "이영희".to_string(),
            role: UserRole::Worker,
        };
        assert!(defect_write_content(
            &mut rows,
            0,
            "외함 스크래치 2건",
            &other,
            "2024-07-02"
        ));
        assert_eq!(rows[0].writer, "김철수");
        assert_eq!(rows[0].date, TODAY);

        // Blanking it clears the stamp again.
        assert!(defect_write_content(&mut rows, 0, "", &other, "2024-07-02"));
        assert!(rows[0].writer.is_empty());
        assert!(rows[0].date.is_empty());
    }

    #[test]
    fn save_projection_keeps_only_filled_rows() {
        let mut rows = seeded_defect_rows(&[]);
        assert_eq!(rows.len(), SEED_DEFECT_ROWS);
        rows.push(filled_defect("내부 배선 손상"));
        let persisted = persistable_defects(&rows);
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].content, "내부 배선 손상");
    }

    #[test]
    fn seeding_pads_existing_rows_to_minimum() {
        let existing = vec![filled_defect("도장 불량")];
        let rows = seeded_defect_rows(&existing);
        assert_eq!(rows.len(), SEED_DEFECT_ROWS);
        assert_eq!(rows[0].content, "도장 불량");
    }

    // Matrix color derivation

    #[test]
    fn matrix_colors_follow_live_recompute() {
        assert_eq!(color_for(None, InspectionType::Process), CellColor::White);

        let failed = record_with(
            InspectionType::Final,
            InspectionResult::Fail,
            vec![entry("A", ItemStatus::Ok)],
        );
        assert_eq!(color_for(Some(&failed), InspectionType::Final), CellColor::Red);

        // Stale stored results are ignored in favor of the live checklist.
        let green = record_with(
            InspectionType::Process,
            InspectionResult::Pending,
            vec![signed_entry("A", ItemStatus::Ok, "이책임")],
        );
        assert_eq!(
            color_for(Some(&green), InspectionType::Process),
            CellColor::Green
        );

        let orange = record_with(
            InspectionType::Final,
            InspectionResult::Pass,
            vec![entry("A", ItemStatus::Ng)],
        );
        assert_eq!(
            color_for(Some(&orange), InspectionType::Final),
            CellColor::Orange
        );

        let all_na = record_with(
            InspectionType::Final,
            InspectionResult::Pending,
            vec![entry("A", ItemStatus::NotApplicable)],
        );
        assert_eq!(
            color_for(Some(&all_na), InspectionType::Final),
            CellColor::Orange
        );
    }

    // Record identity

    #[test]
    fn record_id_combines_identity_tuple() {
        assert_eq!(
            record_id("P24-001", "T-101", 3, InspectionType::Final),
            "P24-001_T-101_3_final"
        );
    }

    #[test]
    fn upsert_overwrites_record_with_same_key() {
        let mut records = Vec::new();
        upsert_inspection(
            &mut records,
            record_with(
                InspectionType::Process,
                InspectionResult::Pending,
                vec![entry("A", ItemStatus::Ok)],
            ),
        );
        upsert_inspection(
            &mut records,
            record_with(
                InspectionType::Process,
                InspectionResult::Pass,
                vec![entry("A", ItemStatus::Ok)],
            ),
        );
        // Same tuple overwrites; a different type is a separate record.
        upsert_inspection(
            &mut records,
            record_with(
                InspectionType::Final,
                InspectionResult::Pending,
                vec![entry("A", ItemStatus::Ok)],
            ),
        );
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].result, InspectionResult::Pass);
    }

    // Built-in data and stores

    #[test]
    fn builtin_masters_are_seeded_and_ordered() {
        let process = builtin_master(InspectionType::Process);
        let final_ = builtin_master(InspectionType::Final);
        assert_eq!(process.len(), PROCESS_MASTER.len());
        assert_eq!(final_.len(), FINAL_MASTER.len());
        assert_eq!(process[0].category, "마킹");
        assert_eq!(process.last().map(|m| m.category.clone()), Some("총조립".to_string()));
        assert_eq!(final_[0].category, "일반");
    }

    #[test]
    fn dedupe_users_keeps_the_last_entry_per_id() {
        let mut users = seed_users();
        let mut updated = users[1].clone();
        updated.department = "신설부서".to_string();
        users.push(updated);
        let deduped = dedupe_users(users);
        assert_eq!(deduped.len(), seed_users().len());
        assert_eq!(deduped[1].department, "신설부서");
    }

    #[test]
    fn json_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("inspections.json");
        let records = vec![record_with(
            InspectionType::Process,
            InspectionResult::Pending,
            vec![signed_entry("A", ItemStatus::Ok, "이책임")],
        )];
        write_json_file(path.as_path(), &records).expect("write");
        let loaded: Option<Vec<InspectionRecord>> = read_json_file(path.as_path()).expect("read");
        assert_eq!(loaded, Some(records));
    }

    #[test]
    fn unreadable_store_reads_as_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        fs::write(path.as_path(), "not json").expect("write");
        let loaded: Option<Vec<User>> = read_json_file(path.as_path()).expect("read");
        assert!(loaded.is_none());
    }

    #[test]
    fn checklist_entry_serializes_with_wire_field_names() {
        let entry = signed_entry("A", ItemStatus::NotApplicable, "이책임");
        let value = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(value["status"], "N/A");
        assert_eq!(value["subCategory"], "-");
        assert_eq!(value["qcInspector"], "이책임");
    }

    // Backup

    #[test]
    fn backup_envelope_round_trips_and_rejects_wrong_password() {
        let envelope = encrypt_text("{\"users\":[]}", "secret").expect("encrypt");
        let decrypted = decrypt_envelope(&envelope, "secret").expect("decrypt");
        assert_eq!(decrypted.as_deref(), Some("{\"users\":[]}"));

        let rejected = decrypt_envelope(&envelope, "wrong").expect("decrypt");
        assert!(rejected.is_none());
    }

    #[test]
    fn backup_merge_upserts_by_identity() {
        let mut current = BackupBundle {
            version: BACKUP_VERSION,
            users: seed_users(),
            projects: Vec::new(),
            inspections: vec![record_with(
                InspectionType::Process,
                InspectionResult::Pending,
                vec![entry("A", ItemStatus::Pending)],
            )],
            templates: TemplateStore::default(),
        };
        current.templates.process = builtin_master(InspectionType::Process);

        let incoming = BackupBundle {
            version: BACKUP_VERSION,
            users: vec![User {
                id: "QM-002".to_string(),
                name: "신규검사".to_string(),
                role: UserRole::Inspector,
                department: "품질경영부".to_string(),
                email: String::new(),
                status: AccountStatus::Active,
                joined_date: TODAY.to_string(),
                password: String::new(),
            }],
            projects: Vec::new(),
            inspections: vec![record_with(
                InspectionType::Process,
                InspectionResult::Pass,
                vec![signed_entry("A", ItemStatus::Ok, "이책임")],
            )],
            templates: TemplateStore::default(),
        };

        let merged = apply_backup("merge", incoming, current);
        assert_eq!(merged.users.len(), seed_users().len() + 1);
        assert_eq!(merged.inspections.len(), 1);
        assert_eq!(merged.inspections[0].result, InspectionResult::Pass);
        // Empty incoming template section leaves the current one in place.
        assert!(!merged.templates.process.is_empty());
    }

    #[test]
    fn backup_replace_takes_incoming_bundle_wholesale() {
        let current = BackupBundle {
            version: BACKUP_VERSION,
            users: seed_users(),
            ..BackupBundle::default()
        };
        let incoming = BackupBundle::default();
        let replaced = apply_backup("replace", incoming, current);
        assert!(replaced.users.is_empty());
        assert_eq!(replaced.version, BACKUP_VERSION);
    }

    // CSV helpers

    #[test]
    fn csv_rows_escape_quotes_and_neutralize_formulas() {
        let rows = vec![vec![
            "=SUM(A1)".to_string(),
            "quote \"here\"".to_string(),
            "with,comma".to_string(),
        ]];
        let csv = rows_to_csv(&["a", "b", "c"], rows.as_slice());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "a,b,c");
        assert_eq!(lines[1], "'=SUM(A1),\"quote \"\"here\"\"\",\"with,comma\"");
    }

    #[test]
    fn report_renders_header_groups_and_verdict() {
        let mut record = record_with(
            InspectionType::Process,
            InspectionResult::Pending,
            vec![
                signed_entry("A", ItemStatus::Ok, "이책임"),
                signed_entry("B", ItemStatus::Ok, "이책임"),
            ],
        );
        record.defect_list = vec![filled_defect("도장 불량")];
        let report = build_inspection_report(None, &record);
        assert!(report.contains("배전반 공정 검사 성적서"));
        assert!(report.contains("## 일반"));
        assert!(report.contains("## 불량 조치 사항"));
        assert!(report.contains("종합 판정: 완료 (Completed)"));
    }
}
