use super::models::OrderRecord;
use super::status;
use crate::common::auth::{Caller, Role};
use crate::common::errors::{AccessDenial, BusinessError};

/// Outcome of an access check. Reasons are meant for direct display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub should_bind: bool,
    pub denial: Option<AccessDenial>,
    pub reason: Option<String>,
}

impl AccessDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            should_bind: false,
            denial: None,
            reason: None,
        }
    }

    fn bind() -> Self {
        Self {
            should_bind: true,
            ..Self::allow()
        }
    }

    fn deny(denial: AccessDenial, reason: &str) -> Self {
        Self {
            allowed: false,
            should_bind: false,
            denial: Some(denial),
            reason: Some(reason.to_string()),
        }
    }

    pub fn into_result(self) -> Result<Self, BusinessError> {
        match self.denial {
            Some(denial) if !self.allowed => Err(BusinessError::Forbidden {
                denial,
                reason: self.reason.unwrap_or_default(),
            }),
            _ => Ok(self),
        }
    }
}

fn same(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.map(str::trim), b.map(str::trim)) {
        (Some(a), Some(b)) => !a.is_empty() && a == b,
        _ => false,
    }
}

/// Decide whether `caller` may see `order`.
///
/// Sales access is judged on the salesman contact before ownership, so a
/// customer binding never locks out the responsible salesperson.
pub fn check_access(order: &OrderRecord, caller: &Caller) -> AccessDecision {
    match &caller.role {
        Role::Administrator => AccessDecision::allow(),
        Role::Sales => {
            if same(caller.phone.as_deref(), order.salesman_contact.as_deref()) {
                AccessDecision::allow()
            } else {
                AccessDecision::deny(AccessDenial::NotOwner, "该订单不属于您负责的客户")
            }
        }
        Role::Customer => match (order.user_id.as_deref(), caller.user_id.as_deref()) {
            (Some(owner), Some(user)) if owner == user => AccessDecision::allow(),
            (Some(_), _) => AccessDecision::deny(
                AccessDenial::NotOwner,
                "该订单已绑定其他账号，请使用绑定的账号登录",
            ),
            (None, Some(_)) => AccessDecision::bind(),
            (None, None) => {
                AccessDecision::deny(AccessDenial::RoleMismatch, "无法识别当前登录账号")
            }
        },
        Role::Lab => AccessDecision::deny(
            AccessDenial::RoleMismatch,
            "实验人员请通过样本查看链接访问订单",
        ),
        Role::Unknown(_) => {
            AccessDecision::deny(AccessDenial::RoleMismatch, "当前账号无权访问订单")
        }
    }
}

/// Access plus the edit window: customers may only write while the workflow
/// label is editable; sales and admins are not bound by it.
pub fn check_edit(order: &OrderRecord, caller: &Caller) -> Result<(), BusinessError> {
    let decision = check_access(order, caller).into_result()?;
    if decision.should_bind {
        // Writes never perform the first-touch binding; that happens on read.
        return Err(BusinessError::Forbidden {
            denial: AccessDenial::NotOwner,
            reason: "请先打开订单完成账号绑定".to_string(),
        });
    }
    if caller.role == Role::Customer && !status::is_editable(order.table_status.as_deref()) {
        return Err(BusinessError::Forbidden {
            denial: AccessDenial::Locked,
            reason: "订单当前状态不可编辑".to_string(),
        });
    }
    Ok(())
}
