use crate::domain::UserId;

// ============== Authorization ==============

/// Admin gate for the command surface. An empty allow-list admits nobody.
pub fn is_authorized(user_id: Option<UserId>, admin_users: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    if admin_users.is_empty() {
        return false;
    }
    admin_users.contains(&user_id.0)
}
