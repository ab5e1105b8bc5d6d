//! Line-level edits of the `policy.csv` authorization document

/// True if a `g, <account>, ...` role binding exists
pub fn has_binding(policy: &str, account: &str) -> bool {
    policy.lines().any(|line| {
        let mut fields = line.split(',').map(str::trim);
        fields.next() == Some("g") && fields.next() == Some(account)
    })
}

/// `policy` with `g, <account>, <role>` appended on its own line
pub fn append_binding(policy: &str, account: &str, role: &str) -> String {
    let mut updated = policy.trim_end().to_string();
    if !updated.is_empty() {
        updated.push('\n');
    }
    updated.push_str(&format!("g, {}, {}\n", account, role));
    updated
}
