//! Ownership-scoped access rules for the admin surface.
//!
//! Every function takes the acting user explicitly. Superusers are never
//! restricted; other staff members only reach the accounts they created.

use crate::models::{Fieldset, ModelPermission, UpdateUser, User, UserFilter};

const SUPERUSER_LIST_DISPLAY: &[&str] = &[
    "username",
    "first_name",
    "last_name",
    "iban",
    "is_staff",
    "is_superuser",
    "is_active",
    "created_by",
];

const STAFF_LIST_DISPLAY: &[&str] = &["username", "first_name", "last_name", "iban", "is_active"];

const SUPERUSER_LIST_FILTERS: &[&str] = &[
    "is_staff",
    "is_superuser",
    "is_active",
    "date_joined",
    "created_by",
];

const STAFF_LIST_FILTERS: &[&str] = &["is_active", "date_joined"];

/// Fields of the "add user" form
pub const CREATION_FIELDS: &[&str] = &["first_name", "last_name", "iban", "password1", "password2"];

/// Ownership rule: superusers pass, others only for records they created.
///
/// A missing target (list or creation context) is permitted; a target
/// without a creator is denied to non-superusers.
pub fn has_object_permission(actor: &User, target: Option<&User>) -> bool {
    if actor.is_superuser {
        return true;
    }
    match target {
        None => true,
        Some(target) => target.created_by == Some(actor.id),
    }
}

pub fn can_view(actor: &User, target: Option<&User>) -> bool {
    actor.is_admin_member()
        && (actor.has_perm(ModelPermission::ViewUser) || actor.has_perm(ModelPermission::ChangeUser))
        && has_object_permission(actor, target)
}

pub fn can_change(actor: &User, target: Option<&User>) -> bool {
    actor.is_admin_member()
        && actor.has_perm(ModelPermission::ChangeUser)
        && has_object_permission(actor, target)
}

pub fn can_delete(actor: &User, target: Option<&User>) -> bool {
    actor.is_admin_member()
        && actor.has_perm(ModelPermission::DeleteUser)
        && has_object_permission(actor, target)
}

pub fn can_add(actor: &User) -> bool {
    actor.is_admin_member() && actor.has_perm(ModelPermission::AddUser)
}

/// Restricts a list filter to what `actor` may see.
pub fn scope_filter(actor: &User, mut filter: UserFilter) -> UserFilter {
    if !actor.is_superuser {
        filter.created_by = Some(actor.id);
    }
    filter
}

pub fn list_display(actor: &User) -> &'static [&'static str] {
    if actor.is_superuser {
        SUPERUSER_LIST_DISPLAY
    } else {
        STAFF_LIST_DISPLAY
    }
}

pub fn list_filters(actor: &User) -> &'static [&'static str] {
    if actor.is_superuser {
        SUPERUSER_LIST_FILTERS
    } else {
        STAFF_LIST_FILTERS
    }
}

/// Sections of the change form; sensitive fields are hidden from non-superusers.
pub fn change_fieldsets(actor: &User) -> Vec<Fieldset> {
    let mut fieldsets = vec![
        Fieldset::new(None, &["username", "password"]),
        Fieldset::new(
            Some("Personal info"),
            &["first_name", "last_name", "email", "iban"],
        ),
    ];

    if actor.is_superuser {
        fieldsets.push(Fieldset::new(
            Some("Permissions"),
            &["is_active", "is_staff", "is_superuser", "groups", "permissions"],
        ));
        fieldsets.push(Fieldset::new(Some("Administration"), &["created_by"]));
    } else {
        fieldsets.push(Fieldset::new(Some("Permissions"), &["is_active"]));
    }

    fieldsets.push(Fieldset::new(
        Some("Important dates"),
        &["last_login", "date_joined"],
    ));
    fieldsets
}

pub fn creation_fieldsets() -> Vec<Fieldset> {
    vec![Fieldset::new(None, CREATION_FIELDS)]
}

/// Drops privilege changes a non-superuser is not allowed to make.
///
/// Staff, superuser, group and permission fields are reset to false/empty
/// for non-superusers whatever was submitted.
pub fn sanitize_update(actor: &User, mut update: UpdateUser) -> UpdateUser {
    if !actor.is_superuser {
        update.is_staff = Some(false);
        update.is_superuser = Some(false);
        update.groups = Some(Vec::new());
        update.permissions = Some(Vec::new());
    }
    update
}
