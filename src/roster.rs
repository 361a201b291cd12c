// src/roster.rs
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// --- Core Data Structures ---

pub type EmployeeId = String;
pub type TeamName = String;
pub type ShiftCode = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredEmployee")]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    #[serde(rename = "currentTeam")]
    pub current_team: TeamName,
    pub schedule: Vec<ShiftCode>,
}

/// On-disk employee shape. Older documents carry `team`, `currentTeam` or both.
#[derive(Deserialize)]
struct StoredEmployee {
    id: EmployeeId,
    name: String,
    #[serde(rename = "currentTeam", default)]
    current_team: Option<TeamName>,
    #[serde(default)]
    team: Option<TeamName>,
    #[serde(default)]
    schedule: Vec<ShiftCode>,
}

impl From<StoredEmployee> for Employee {
    fn from(stored: StoredEmployee) -> Self {
        let current_team = stored
            .current_team
            .filter(|t| !t.is_empty())
            .or(stored.team)
            .unwrap_or_default();
        Self {
            id: stored.id,
            name: stored.name,
            current_team,
            schedule: stored.schedule,
        }
    }
}

impl Employee {
    pub fn new(id: &str, name: &str, team: &str, schedule: Vec<ShiftCode>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            current_team: team.to_string(),
            schedule,
        }
    }

    /// Grows the schedule with blank cells up to `len`. Never truncates.
    pub fn pad_schedule(&mut self, len: usize) {
        if self.schedule.len() < len {
            self.schedule.resize(len, String::new());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub name: TeamName,
    pub employees: Vec<Employee>,
}

/// Team name -> members, kept in insertion order (serialized as a JSON object).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Teams(Vec<Team>);

impl Teams {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|t| t.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|t| t.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Team> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Team> {
        self.0.iter_mut()
    }

    pub fn get(&self, name: &str) -> Option<&Vec<Employee>> {
        self.0.iter().find(|t| t.name == name).map(|t| &t.employees)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<Employee>> {
        self.0
            .iter_mut()
            .find(|t| t.name == name)
            .map(|t| &mut t.employees)
    }

    /// Members of `name`, creating an empty team at the end if it does not exist.
    pub fn entry(&mut self, name: &str) -> &mut Vec<Employee> {
        let index = match self.0.iter().position(|t| t.name == name) {
            Some(index) => index,
            None => {
                self.0.push(Team {
                    name: name.to_string(),
                    employees: Vec::new(),
                });
                self.0.len() - 1
            }
        };
        &mut self.0[index].employees
    }

    /// Replaces (in place) or appends a team.
    pub fn insert(&mut self, name: &str, employees: Vec<Employee>) {
        match self.get_mut(name) {
            Some(existing) => *existing = employees,
            None => self.0.push(Team {
                name: name.to_string(),
                employees,
            }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<Employee>> {
        let index = self.0.iter().position(|t| t.name == name)?;
        Some(self.0.remove(index).employees)
    }

    pub fn retain<F: FnMut(&Team) -> bool>(&mut self, keep: F) {
        self.0.retain(keep);
    }

    /// Renames a team keeping its position. Returns false if `old` is unknown.
    /// Renaming onto an existing name folds the members into that team.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        if old == new {
            return self.contains(old);
        }
        let Some(index) = self.0.iter().position(|t| t.name == old) else {
            return false;
        };
        if self.contains(new) {
            let moved = self.0.remove(index).employees;
            self.entry(new).extend(moved);
        } else {
            self.0[index].name = new.to_string();
        }
        true
    }

    /// Locates an employee by id across every team: (team name, position).
    pub fn locate(&self, employee_id: &str) -> Option<(&str, usize)> {
        self.0.iter().find_map(|t| {
            t.employees
                .iter()
                .position(|e| e.id == employee_id)
                .map(|pos| (t.name.as_str(), pos))
        })
    }

    pub fn find_employee(&self, employee_id: &str) -> Option<(&str, &Employee)> {
        self.0.iter().find_map(|t| {
            t.employees
                .iter()
                .find(|e| e.id == employee_id)
                .map(|e| (t.name.as_str(), e))
        })
    }

    pub fn find_employee_mut(&mut self, employee_id: &str) -> Option<(&str, &mut Employee)> {
        self.0.iter_mut().find_map(|t| {
            let name = t.name.as_str();
            t.employees
                .iter_mut()
                .find(|e| e.id == employee_id)
                .map(|e| (name, e))
        })
    }

    pub fn employees(&self) -> impl Iterator<Item = &Employee> {
        self.0.iter().flat_map(|t| t.employees.iter())
    }

    pub fn employee_count(&self) -> usize {
        self.0.iter().map(|t| t.employees.len()).sum()
    }
}

impl Serialize for Teams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for team in &self.0 {
            map.serialize_entry(&team.name, &team.employees)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Teams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TeamsVisitor;

        impl<'de> Visitor<'de> for TeamsVisitor {
            type Value = Teams;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of team name to employee list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Teams, A::Error> {
                let mut teams = Teams::new();
                while let Some((name, employees)) =
                    access.next_entry::<String, Vec<Employee>>()?
                {
                    teams.insert(&name, employees);
                }
                Ok(teams)
            }
        }

        deserializer.deserialize_map(TeamsVisitor)
    }
}

// --- Dataset ---

/// One roster tier (synced, overlay or display). `allEmployees` is not stored:
/// it is projected from `teams` whenever the dataset is serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub teams: Teams,
    #[serde(default)]
    pub headers: Vec<String>,
}

#[derive(Serialize)]
struct DatasetView<'a> {
    teams: &'a Teams,
    headers: &'a [String],
    #[serde(rename = "allEmployees")]
    all_employees: Vec<&'a Employee>,
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DatasetView {
            teams: &self.teams,
            headers: &self.headers,
            all_employees: self.teams.employees().collect(),
        }
        .serialize(serializer)
    }
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.teams.is_empty() && self.headers.is_empty()
    }

    pub fn header_index(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Sets every employee's `current_team` to the team that holds it.
    pub fn stamp_teams(&mut self) {
        for team in self.teams.iter_mut() {
            for employee in team.employees.iter_mut() {
                employee.current_team = team.name.clone();
            }
        }
    }

    /// Flat, team-stamped list of every employee in team order.
    pub fn all_employees(&self) -> Vec<Employee> {
        self.teams
            .iter()
            .flat_map(|t| {
                t.employees.iter().map(move |e| Employee {
                    current_team: t.name.clone(),
                    ..e.clone()
                })
            })
            .collect()
    }
}
