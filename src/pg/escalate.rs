/*
 * Copyright 2021 Daniel Bornkessel
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Scoped escalation: the operator joins a role, runs a privileged statement
//! and leaves the role again on every exit path. Memberships the operator
//! held before are left alone.

use crate::pg::executor::{Condition, SqlError};
use crate::pg::Driver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Membership {
    /// the operator was granted the role and has to leave it again
    Joined,
    /// the operator already was a member and stays one
    Member,
    /// the role is the operator's own role
    Own,
    /// the role does not exist
    Missing,
}

pub(crate) async fn join_role(driver: &dyn Driver, role: &str) -> Result<Membership, SqlError> {
    if role == driver.user() {
        return Ok(Membership::Own);
    }
    if driver.is_member(role, driver.user()).await? {
        return Ok(Membership::Member);
    }
    match driver.grant_role(role, driver.user()).await {
        Ok(()) => Ok(Membership::Joined),
        Err(e) if e.is(Condition::UndefinedObject) => Ok(Membership::Missing),
        Err(e) => Err(e),
    }
}

pub(crate) async fn leave_role(driver: &dyn Driver, role: &str, membership: Membership) {
    if membership != Membership::Joined {
        return;
    }
    if let Err(e) = driver.revoke_role(role, driver.user()).await {
        warn!("could not revoke {} from {}: {}", role, driver.user(), e);
    }
}

/// Runs `alter_default_login_role` (or its reset with `group = None`) while
/// the operator is a member of `login`.
pub(crate) async fn with_login_role(
    driver: &dyn Driver,
    login: &str,
    group: Option<&str>,
) -> Result<(), SqlError> {
    let membership = join_role(driver, login).await?;
    let result = match group {
        Some(group) => driver.alter_default_login_role(login, group).await,
        None => driver.reset_default_login_role(login).await,
    };
    leave_role(driver, login, membership).await;
    result
}
